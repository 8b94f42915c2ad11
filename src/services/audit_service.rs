//! Audit job operations behind the HTTP and CLI surfaces.

use std::sync::Arc;
use std::time::Duration;

use crate::audit::{
    AuditError, CallbackNotifier, CancelOutcome, CancellationController, ExportArtifact,
    ExportFormat, ExportGateway, JobCounts, JobFilter, JobLimits, JobPage, JobRegistry,
    JobSnapshot, JobSpec, PageRequest, RetryPolicy, RuleResult, TaskScheduler,
};
use crate::error::{AppError, AppResult};
use crate::external::{Collaborators, ExternalError, RuleSetRepository};

/// Tunables the service is built with
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditOptions {
    pub limits: JobLimits,
    pub retry_policy: RetryPolicy,
    pub task_timeout: Option<Duration>,
    /// Upper bound on how long a synchronous create waits before answering
    /// with the still-running job
    pub sync_wait: Option<Duration>,
}

#[derive(Clone)]
pub struct AuditService {
    registry: Arc<JobRegistry>,
    scheduler: Arc<TaskScheduler>,
    cancellation: CancellationController,
    exports: Arc<ExportGateway>,
    rule_sets: Arc<dyn RuleSetRepository>,
    sync_wait: Option<Duration>,
}

impl AuditService {
    pub fn new(collaborators: Collaborators, options: AuditOptions) -> Self {
        let registry = Arc::new(JobRegistry::new(options.limits));
        let notifier = CallbackNotifier::new(collaborators.callbacks, options.retry_policy);
        let scheduler = Arc::new(TaskScheduler::new(
            collaborators.evaluator,
            collaborators.documents,
            notifier,
            options.task_timeout,
        ));

        Self {
            cancellation: CancellationController::new(Arc::clone(&registry)),
            registry,
            scheduler,
            exports: Arc::new(ExportGateway::new(collaborators.exporter)),
            rule_sets: collaborators.rule_sets,
            sync_wait: options.sync_wait,
        }
    }

    /// Resolves the rule set, registers the job and starts it.
    ///
    /// Async jobs return right away in PENDING or RUNNING. Sync jobs return
    /// once finalized, unless `sync_wait` elapses first.
    pub async fn create_job(&self, spec: JobSpec) -> AppResult<JobSnapshot> {
        let rule_set_id = spec.rule_set_id.clone();
        let rules = self
            .rule_sets
            .resolve(&rule_set_id)
            .await
            .map_err(|e| match e {
                ExternalError::NotFound { .. } => AuditError::NotFound {
                    entity: "RuleSet",
                    id: rule_set_id.clone(),
                },
                other => AuditError::Orchestration(format!(
                    "rule set {} could not be resolved: {}",
                    rule_set_id, other
                )),
            })?;

        let job = self.registry.create(spec, rules).await?;
        let handle = self.scheduler.spawn(Arc::clone(&job));

        if job.definition().is_async {
            return Ok(job.snapshot().await);
        }

        let joined = match self.sync_wait {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    tracing::warn!(
                        job_id = %job.id(),
                        wait_secs = limit.as_secs(),
                        "Synchronous job still running, answering early"
                    );
                    None
                }
            },
            None => Some(handle.await),
        };

        if let Some(Err(e)) = joined {
            return Err(AppError::Internal {
                source: anyhow::anyhow!("audit job {} aborted: {}", job.id(), e),
            });
        }

        Ok(job.snapshot().await)
    }

    pub async fn get_job(&self, job_id: &str) -> AppResult<JobSnapshot> {
        Ok(self.registry.snapshot(job_id).await?)
    }

    pub async fn list_jobs(&self, filter: JobFilter, page: PageRequest) -> JobPage {
        self.registry.list(filter, page).await
    }

    /// Results recorded so far, in completion order
    pub async fn job_results(&self, job_id: &str) -> AppResult<Vec<RuleResult>> {
        let job = self.registry.get(job_id)?;
        Ok(job.results().results().await)
    }

    pub async fn export_job(&self, job_id: &str, format: ExportFormat) -> AppResult<ExportArtifact> {
        let job = self.registry.get(job_id)?;
        Ok(self.exports.export(&job, format).await?)
    }

    /// Requests cancellation and returns the outcome with the job as seen
    /// right after the request.
    pub async fn cancel_job(&self, job_id: &str) -> AppResult<(CancelOutcome, JobSnapshot)> {
        let outcome = self.cancellation.cancel(job_id).await?;
        let snapshot = self.registry.snapshot(job_id).await?;
        Ok((outcome, snapshot))
    }

    pub async fn job_counts(&self) -> JobCounts {
        self.registry.counts().await
    }
}
