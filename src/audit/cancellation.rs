use std::sync::Arc;

use crate::audit::error::AuditResult;
use crate::audit::registry::JobRegistry;
use crate::audit::types::JobStatus;

/// What a cancel request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The flag was set by this call
    Requested,
    /// Another caller already set the flag
    AlreadyRequested,
    /// The job had already finished; nothing changed
    AlreadyTerminal(JobStatus),
}

impl CancelOutcome {
    /// Whether this call was the one that requested cancellation
    pub fn accepted(&self) -> bool {
        matches!(self, CancelOutcome::Requested)
    }
}

/// Sets the cooperative cancel flag of a job.
///
/// Workers check the flag between task pulls; in-flight evaluations run to
/// completion, and the scheduler performs the terminal transition.
#[derive(Debug, Clone)]
pub struct CancellationController {
    registry: Arc<JobRegistry>,
}

impl CancellationController {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    pub async fn cancel(&self, job_id: &str) -> AuditResult<CancelOutcome> {
        let entry = self.registry.get(job_id)?;

        let outcome = entry.request_cancel_if_active().await;
        match outcome {
            CancelOutcome::Requested => tracing::info!(job_id, "Cancellation requested"),
            CancelOutcome::AlreadyTerminal(status) => {
                tracing::debug!(job_id, %status, "Cancel ignored for finished job")
            }
            CancelOutcome::AlreadyRequested => {}
        }
        Ok(outcome)
    }
}
