//! In-memory table of audit jobs.
//!
//! Each job lives in its own [`JobEntry`] behind an `Arc`, so the table lock
//! (a `DashMap` shard) is never held across an await. Status changes are
//! compare-and-swap operations under the entry's own lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use jiff::Timestamp;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audit::aggregator::ResultAggregator;
use crate::audit::cancellation::CancelOutcome;
use crate::audit::error::{AuditError, AuditResult};
use crate::audit::progress::ProgressTracker;
use crate::audit::types::{JobSnapshot, JobSpec, JobStatus, JobSummary, Rule};

/// Concurrency and retention bounds applied at job creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobLimits {
    pub default_concurrency: u32,
    pub max_concurrency: u32,
    /// Finished jobs kept in memory; 0 keeps everything
    pub retain_finished: usize,
}

impl Default for JobLimits {
    fn default() -> Self {
        Self {
            default_concurrency: 5,
            max_concurrency: 32,
            retain_finished: 1000,
        }
    }
}

/// Immutable part of a job, fixed at creation
#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub name: String,
    pub description: Option<String>,
    pub rule_set_id: String,
    pub document_ids: Vec<String>,
    pub rules: Vec<Rule>,
    pub concurrency: u32,
    pub is_async: bool,
    pub callback_url: Option<String>,
    pub start_time: Timestamp,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    end_time: Option<Timestamp>,
    error_message: Option<String>,
    summary: Option<JobSummary>,
}

/// Values stamped onto a job by its terminal transition
#[derive(Debug, Clone)]
pub struct Finalization {
    pub status: JobStatus,
    pub summary: JobSummary,
    pub error_message: Option<String>,
}

#[derive(Debug)]
pub struct JobEntry {
    id: String,
    sequence: u64,
    definition: JobDefinition,
    state: RwLock<JobState>,
    progress: ProgressTracker,
    results: ResultAggregator,
    cancel_token: CancellationToken,
    cancel_requested: AtomicBool,
}

impl JobEntry {
    fn new(id: String, sequence: u64, definition: JobDefinition, total_tasks: u32) -> Self {
        Self {
            id,
            sequence,
            definition,
            state: RwLock::new(JobState {
                status: JobStatus::Pending,
                end_time: None,
                error_message: None,
                summary: None,
            }),
            progress: ProgressTracker::new(total_tasks),
            results: ResultAggregator::new(),
            cancel_token: CancellationToken::new(),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn results(&self) -> &ResultAggregator {
        &self.results
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Sets the cancel flag unless the job has finished.
    ///
    /// The state read lock is held across the check and the flag swap, so a
    /// concurrent `finalize` cannot slip in between them.
    pub async fn request_cancel_if_active(&self) -> CancelOutcome {
        let state = self.state.read().await;
        if state.status.is_terminal() {
            return CancelOutcome::AlreadyTerminal(state.status);
        }
        if self.cancel_requested.swap(true, Ordering::AcqRel) {
            return CancelOutcome::AlreadyRequested;
        }
        self.cancel_token.cancel();
        CancelOutcome::Requested
    }

    pub async fn status(&self) -> JobStatus {
        self.state.read().await.status
    }

    pub async fn summary(&self) -> Option<JobSummary> {
        self.state.read().await.summary
    }

    /// Compare-and-swap on the status; returns whether it took effect.
    pub async fn transition(&self, from: JobStatus, to: JobStatus) -> bool {
        let mut state = self.state.write().await;
        if state.status != from || from.is_terminal() {
            return false;
        }
        state.status = to;
        true
    }

    /// Terminal transition from `from`, stamping end time, summary and error
    /// under the same lock. Only the first caller wins.
    pub async fn finalize(&self, from: JobStatus, outcome: Finalization) -> bool {
        debug_assert!(outcome.status.is_terminal());
        let mut state = self.state.write().await;
        if state.status != from || from.is_terminal() {
            return false;
        }
        state.status = outcome.status;
        state.end_time = Some(Timestamp::now());
        state.summary = Some(outcome.summary);
        state.error_message = outcome.error_message;
        true
    }

    /// Counters are read while holding the state lock. They stop moving
    /// before the terminal write, so a terminal status always comes with
    /// final counters.
    pub async fn snapshot(&self) -> JobSnapshot {
        let state = self.state.read().await;
        let progress = self.progress.snapshot();
        let definition = &self.definition;

        JobSnapshot {
            job_id: self.id.clone(),
            job_name: definition.name.clone(),
            description: definition.description.clone(),
            rule_set_id: definition.rule_set_id.clone(),
            document_ids: definition.document_ids.clone(),
            concurrency: definition.concurrency,
            is_async: definition.is_async,
            callback_url: definition.callback_url.clone(),
            status: state.status,
            progress: progress.percent(),
            total_tasks: progress.total,
            completed_tasks: progress.completed,
            failed_tasks: progress.failed,
            start_time: definition.start_time,
            end_time: state.end_time,
            error_message: state.error_message.clone(),
            result_summary: state.summary,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
}

/// 1-based page request
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.page_size as usize
    }
}

#[derive(Debug, Clone)]
pub struct JobPage {
    pub items: Vec<JobSnapshot>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug)]
pub struct JobRegistry {
    jobs: DashMap<String, Arc<JobEntry>>,
    sequence: AtomicU64,
    limits: JobLimits,
}

impl JobRegistry {
    pub fn new(limits: JobLimits) -> Self {
        Self {
            jobs: DashMap::new(),
            sequence: AtomicU64::new(0),
            limits,
        }
    }

    /// Validates the request and publishes a PENDING job.
    ///
    /// `rules` is the already-resolved rule set; the task count is fixed here
    /// as `documents × rules`.
    pub async fn create(&self, spec: JobSpec, rules: Vec<Rule>) -> AuditResult<Arc<JobEntry>> {
        let concurrency = self.validate(&spec, &rules)?;
        let total_tasks = u32::try_from(spec.document_ids.len() * rules.len())
            .map_err(|_| AuditError::validation("documentIds", "Too many tasks for one job"))?;

        let definition = JobDefinition {
            name: spec.name,
            description: spec.description,
            rule_set_id: spec.rule_set_id,
            document_ids: spec.document_ids,
            rules,
            concurrency,
            is_async: spec.is_async,
            callback_url: spec.callback_url,
            start_time: Timestamp::now(),
        };

        let id = Uuid::new_v4().to_string();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(JobEntry::new(id.clone(), sequence, definition, total_tasks));
        self.jobs.insert(id, Arc::clone(&entry));

        tracing::debug!(
            job_id = %entry.id(),
            total_tasks,
            concurrency,
            "Audit job registered"
        );

        self.evict_finished().await;
        Ok(entry)
    }

    fn validate(&self, spec: &JobSpec, rules: &[Rule]) -> AuditResult<u32> {
        if spec.document_ids.is_empty() {
            return Err(AuditError::validation(
                "documentIds",
                "At least one document is required",
            ));
        }

        let mut seen = HashSet::with_capacity(spec.document_ids.len());
        for document_id in &spec.document_ids {
            if document_id.trim().is_empty() {
                return Err(AuditError::validation(
                    "documentIds",
                    "Document ids cannot be blank",
                ));
            }
            if !seen.insert(document_id.as_str()) {
                return Err(AuditError::validation(
                    "documentIds",
                    format!("Duplicate document id '{}'", document_id),
                ));
            }
        }

        if rules.is_empty() {
            return Err(AuditError::validation(
                "ruleSetId",
                format!("Rule set '{}' contains no rules", spec.rule_set_id),
            ));
        }

        match spec.concurrency {
            Some(0) => Err(AuditError::validation(
                "concurrency",
                "Concurrency must be at least 1",
            )),
            Some(requested) => Ok(requested.min(self.limits.max_concurrency.max(1))),
            None => Ok(self
                .limits
                .default_concurrency
                .clamp(1, self.limits.max_concurrency.max(1))),
        }
    }

    pub fn get(&self, job_id: &str) -> AuditResult<Arc<JobEntry>> {
        self.jobs
            .get(job_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AuditError::job_not_found(job_id))
    }

    pub async fn snapshot(&self, job_id: &str) -> AuditResult<JobSnapshot> {
        Ok(self.get(job_id)?.snapshot().await)
    }

    /// Compare-and-swap by id. Unknown ids are an error; a status mismatch
    /// is a silent no-op returning `false`.
    pub async fn transition(&self, job_id: &str, from: JobStatus, to: JobStatus) -> AuditResult<bool> {
        Ok(self.get(job_id)?.transition(from, to).await)
    }

    /// Newest first. Each job is snapshotted on its own; there is no lock
    /// across the whole table.
    pub async fn list(&self, filter: JobFilter, page: PageRequest) -> JobPage {
        let mut snapshots = Vec::new();
        for entry in self.entries_newest_first() {
            let snapshot = entry.snapshot().await;
            if filter.status.is_none_or(|status| status == snapshot.status) {
                snapshots.push(snapshot);
            }
        }

        let total = snapshots.len() as u64;
        let items = snapshots
            .into_iter()
            .skip(page.offset())
            .take(page.page_size as usize)
            .collect();

        JobPage { items, total }
    }

    pub async fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for entry in self.entries_newest_first() {
            match entry.status().await {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn entries_newest_first(&self) -> Vec<Arc<JobEntry>> {
        let mut entries: Vec<Arc<JobEntry>> = self
            .jobs
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        entries
    }

    /// Drops the oldest finished jobs beyond the retention limit.
    async fn evict_finished(&self) {
        let retain = self.limits.retain_finished;
        if retain == 0 {
            return;
        }

        let mut finished = Vec::new();
        for entry in self.entries_newest_first() {
            if entry.status().await.is_terminal() {
                finished.push(entry);
            }
        }

        for entry in finished.into_iter().skip(retain) {
            self.jobs.remove(entry.id());
            tracing::debug!(job_id = %entry.id(), "Evicted finished audit job");
        }
    }
}
