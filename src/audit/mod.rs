//! Audit job orchestration engine.
//!
//! A job is registered in the [`JobRegistry`], run by the [`TaskScheduler`]
//! over `documents × rules` tasks, and finalized exactly once. Everything
//! here is in-memory and single-process.

pub mod aggregator;
pub mod callback;
pub mod cancellation;
pub mod error;
pub mod export;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod types;

pub use aggregator::ResultAggregator;
pub use callback::{CallbackNotifier, DeliveryReport, RetryPolicy};
pub use cancellation::{CancelOutcome, CancellationController};
pub use error::{AuditError, AuditResult};
pub use export::{ExportArtifact, ExportFormat, ExportGateway, JsonExport};
pub use progress::{ProgressSnapshot, ProgressTracker, TaskOutcome};
pub use registry::{JobCounts, JobEntry, JobFilter, JobLimits, JobPage, JobRegistry, PageRequest};
pub use scheduler::TaskScheduler;
pub use types::{
    Document, Evidence, JobSnapshot, JobSpec, JobStatus, JobSummary, MatchType, Paragraph,
    ResultStatus, Rule, RuleResult, Task, TextSpan, Verdict,
};
