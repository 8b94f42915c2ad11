//! Fans a job out into (document, rule) tasks and runs them on a bounded
//! worker pool.
//!
//! Workers pull task indices from a shared cursor. The cursor is the only
//! place cancellation is observed, so a task is either fully dispatched or
//! never started.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::audit::callback::CallbackNotifier;
use crate::audit::error::{AuditError, AuditResult};
use crate::audit::progress::TaskOutcome;
use crate::audit::registry::{Finalization, JobEntry};
use crate::audit::types::{JobStatus, ResultStatus, RuleResult, Task, Verdict};
use crate::external::{DocumentStore, RuleEvaluator};

/// Deterministic task order: documents in request order, then rules in
/// rule-set order.
pub fn build_tasks(job: &JobEntry) -> Vec<Task> {
    let definition = job.definition();
    let mut tasks = Vec::with_capacity(definition.document_ids.len() * definition.rules.len());
    for document_id in &definition.document_ids {
        for rule in &definition.rules {
            tasks.push(Task {
                index: tasks.len(),
                job_id: job.id().to_string(),
                document_id: document_id.clone(),
                rule: rule.clone(),
            });
        }
    }
    tasks
}

struct TaskCursor {
    tasks: Vec<Task>,
    next: AtomicUsize,
    cancel: CancellationToken,
    cancel_observed: AtomicBool,
    halted: AtomicBool,
}

impl TaskCursor {
    fn new(tasks: Vec<Task>, cancel: CancellationToken) -> Self {
        Self {
            tasks,
            next: AtomicUsize::new(0),
            cancel,
            cancel_observed: AtomicBool::new(false),
            halted: AtomicBool::new(false),
        }
    }

    /// Claims the next task. The index is claimed before the cancel flag is
    /// checked, so an observed cancellation always leaves a task undispatched.
    fn claim(&self) -> Option<&Task> {
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        let task = self.tasks.get(index)?;
        if self.halted.load(Ordering::Acquire) {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.cancel_observed.store(true, Ordering::Release);
            return None;
        }
        Some(task)
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    fn cancel_observed(&self) -> bool {
        self.cancel_observed.load(Ordering::Acquire)
    }
}

pub struct TaskScheduler {
    evaluator: Arc<dyn RuleEvaluator>,
    documents: Arc<dyn DocumentStore>,
    notifier: CallbackNotifier,
    task_timeout: Option<Duration>,
}

impl TaskScheduler {
    pub fn new(
        evaluator: Arc<dyn RuleEvaluator>,
        documents: Arc<dyn DocumentStore>,
        notifier: CallbackNotifier,
        task_timeout: Option<Duration>,
    ) -> Self {
        Self {
            evaluator,
            documents,
            notifier,
            task_timeout,
        }
    }

    /// Runs the job on its own tokio task. Sync callers await the handle;
    /// async callers drop it.
    pub fn spawn(self: &Arc<Self>, job: Arc<JobEntry>) -> JoinHandle<JobStatus> {
        let scheduler = Arc::clone(self);
        let span = tracing::info_span!("audit_job", job_id = %job.id());
        tokio::spawn(async move { scheduler.run(job).await }.instrument(span))
    }

    /// Drives a job from PENDING to a terminal status and returns it.
    ///
    /// Only the caller that wins PENDING -> RUNNING executes anything; any
    /// other call returns the current status.
    pub async fn run(self: Arc<Self>, job: Arc<JobEntry>) -> JobStatus {
        if !job.transition(JobStatus::Pending, JobStatus::Running).await {
            return job.status().await;
        }

        let total = job.progress().total();
        tracing::info!(
            total_tasks = total,
            concurrency = job.definition().concurrency,
            "Audit job started"
        );

        if let Err(e) = self.evaluator.ready().await {
            let message = format!("Rule evaluator unavailable: {}", e);
            tracing::error!(error = %e, "Audit job cannot dispatch tasks");
            return self.finish(&job, JobStatus::Failed, Some(message)).await;
        }

        let cursor = Arc::new(TaskCursor::new(build_tasks(&job), job.cancel_token().clone()));
        let workers = job.definition().concurrency.min(total) as usize;

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let scheduler = Arc::clone(&self);
            let job = Arc::clone(&job);
            let cursor = Arc::clone(&cursor);
            pool.spawn(
                async move { scheduler.work(&job, &cursor).await }.in_current_span(),
            );
            tracing::trace!(worker, "Worker spawned");
        }

        let mut fault = None;
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Audit worker faulted");
                cursor.halt();
                if fault.is_none() {
                    fault = Some(AuditError::Orchestration(format!("worker fault: {}", e)));
                }
            }
        }

        match fault {
            Some(e) => self.finish(&job, JobStatus::Failed, Some(e.to_string())).await,
            None if cursor.cancel_observed() => self.finish(&job, JobStatus::Cancelled, None).await,
            None => self.finish(&job, JobStatus::Completed, None).await,
        }
    }

    async fn work(&self, job: &JobEntry, cursor: &TaskCursor) {
        while let Some(task) = cursor.claim() {
            let result = match self.evaluate(task).await {
                Ok(verdict) => RuleResult::from_verdict(task, verdict),
                Err(e) => {
                    tracing::warn!(
                        task_index = task.index,
                        document_id = %task.document_id,
                        rule_id = %task.rule.id,
                        error = %e,
                        "Audit task failed"
                    );
                    let message = match e {
                        AuditError::Task { message, .. } => message,
                        other => other.to_string(),
                    };
                    RuleResult::from_error(task, &message)
                }
            };

            let outcome = match result.status {
                ResultStatus::Error => TaskOutcome::Failed,
                _ => TaskOutcome::Completed,
            };

            // Results land before the counter moves, so a finished count never
            // runs ahead of the result set.
            job.results().record(result).await;
            if let Some(progress) = job.progress().on_task_finished(outcome) {
                tracing::debug!(
                    task_index = task.index,
                    completed = progress.completed,
                    failed = progress.failed,
                    progress = progress.percent(),
                    "Audit task finished"
                );
            }
        }
    }

    async fn evaluate(&self, task: &Task) -> AuditResult<Verdict> {
        let task_error = |message: String| AuditError::Task {
            document_id: task.document_id.clone(),
            rule_id: task.rule.id.clone(),
            message,
        };

        let document = self
            .documents
            .fetch(&task.document_id)
            .await
            .map_err(|e| task_error(e.to_string()))?;

        let evaluation = self.evaluator.evaluate(&document, &task.rule);
        let verdict = match self.task_timeout {
            Some(limit) => tokio::time::timeout(limit, evaluation)
                .await
                .map_err(|_| task_error(format!("evaluation timed out after {:?}", limit)))?,
            None => evaluation.await,
        };

        verdict.map_err(|e| task_error(e.to_string()))
    }

    /// Terminal transition plus callback. The callback fires only for the
    /// call whose transition took effect.
    async fn finish(&self, job: &JobEntry, status: JobStatus, error_message: Option<String>) -> JobStatus {
        let summary = job.results().summarize().await;
        let finalized = job
            .finalize(
                JobStatus::Running,
                Finalization {
                    status,
                    summary,
                    error_message,
                },
            )
            .await;
        if !finalized {
            return job.status().await;
        }

        let snapshot = job.snapshot().await;
        tracing::info!(
            %status,
            completed = snapshot.completed_tasks,
            failed = snapshot.failed_tasks,
            pass_rate = summary.pass_rate,
            "Audit job finished"
        );

        let definition = job.definition();
        if definition.is_async {
            if let Some(url) = &definition.callback_url {
                self.notifier.dispatch(url.clone(), snapshot);
            }
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::callback::tests::{RecordingClient, fast_policy};
    use crate::audit::cancellation::{CancelOutcome, CancellationController};
    use crate::audit::registry::{JobLimits, JobRegistry};
    use crate::audit::types::{Document, JobSpec, Paragraph, Rule};
    use crate::external::{ExternalError, ExternalResult};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    struct Store;

    #[async_trait]
    impl DocumentStore for Store {
        async fn fetch(&self, document_id: &str) -> ExternalResult<Document> {
            if document_id == "missing" {
                return Err(ExternalError::not_found("Document", document_id));
            }
            Ok(Document {
                id: document_id.to_string(),
                title: document_id.to_string(),
                paragraphs: vec![Paragraph {
                    page: 1,
                    text: "The premium is payable monthly.".to_string(),
                }],
            })
        }
    }

    fn passed() -> Verdict {
        Verdict {
            status: ResultStatus::Passed,
            score: 1.0,
            threshold: 0.8,
            evidences: vec![],
            recommendation: None,
        }
    }

    /// Passes everything, fails rules named in `failing`, and tracks the
    /// highest number of evaluations in flight
    #[derive(Default)]
    struct ProbeEvaluator {
        failing: HashSet<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl RuleEvaluator for ProbeEvaluator {
        async fn evaluate(&self, document: &Document, rule: &Rule) -> ExternalResult<Verdict> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .unwrap()
                .push((document.id.clone(), rule.id.clone()));
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&rule.id) {
                Err(ExternalError::Evaluation("model rejected input".to_string()))
            } else {
                Ok(passed())
            }
        }
    }

    /// Blocks every evaluation until a permit is released
    struct GatedEvaluator {
        gate: Semaphore,
        started: AtomicUsize,
    }

    impl GatedEvaluator {
        fn new() -> Self {
            Self {
                gate: Semaphore::new(0),
                started: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RuleEvaluator for GatedEvaluator {
        async fn evaluate(&self, _document: &Document, _rule: &Rule) -> ExternalResult<Verdict> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ExternalError::Unavailable(e.to_string()))?;
            permit.forget();
            Ok(passed())
        }
    }

    struct UnreadyEvaluator;

    #[async_trait]
    impl RuleEvaluator for UnreadyEvaluator {
        async fn evaluate(&self, _document: &Document, _rule: &Rule) -> ExternalResult<Verdict> {
            Ok(passed())
        }

        async fn ready(&self) -> ExternalResult<()> {
            Err(ExternalError::Unavailable("model endpoint down".to_string()))
        }
    }

    struct PanickingEvaluator;

    #[async_trait]
    impl RuleEvaluator for PanickingEvaluator {
        async fn evaluate(&self, _document: &Document, _rule: &Rule) -> ExternalResult<Verdict> {
            panic!("evaluator bug");
        }
    }

    fn rules(count: usize) -> Vec<Rule> {
        (1..=count)
            .map(|i| Rule {
                id: format!("r{}", i),
                name: format!("Rule {}", i),
                description: None,
                keywords: vec!["premium".to_string()],
                threshold: 0.8,
                warning_margin: 0.2,
                recommendation: None,
            })
            .collect()
    }

    struct Harness {
        registry: Arc<JobRegistry>,
        scheduler: Arc<TaskScheduler>,
        callbacks: Arc<RecordingClient>,
    }

    fn harness(evaluator: Arc<dyn RuleEvaluator>, callbacks: RecordingClient, timeout: Option<Duration>) -> Harness {
        let callbacks = Arc::new(callbacks);
        let notifier = CallbackNotifier::new(callbacks.clone(), fast_policy(2));
        Harness {
            registry: Arc::new(JobRegistry::new(JobLimits::default())),
            scheduler: Arc::new(TaskScheduler::new(evaluator, Arc::new(Store), notifier, timeout)),
            callbacks,
        }
    }

    impl Harness {
        async fn job(&self, documents: &[&str], rule_count: usize, concurrency: u32, callback: bool) -> Arc<JobEntry> {
            let spec = JobSpec {
                name: "scenario".to_string(),
                rule_set_id: "rs".to_string(),
                document_ids: documents.iter().map(|d| d.to_string()).collect(),
                concurrency: Some(concurrency),
                is_async: callback,
                callback_url: callback.then(|| "http://127.0.0.1:9/unreachable".to_string()),
                ..Default::default()
            };
            self.registry.create(spec, rules(rule_count)).await.unwrap()
        }

        async fn wait_for_callbacks(&self, expected: u32) {
            tokio::time::timeout(Duration::from_secs(5), async {
                while self.callbacks.calls() < expected {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_two_documents_three_rules_complete() {
        let evaluator = Arc::new(ProbeEvaluator {
            delay: Duration::from_millis(5),
            ..Default::default()
        });
        let h = harness(evaluator.clone(), RecordingClient::failing(0), None);
        let job = h.job(&["policy-a", "policy-b"], 3, 2, false).await;

        let status = h.scheduler.spawn(job.clone()).await.unwrap();

        assert_eq!(status, JobStatus::Completed);
        let snapshot = job.snapshot().await;
        assert_eq!(snapshot.total_tasks, 6);
        assert_eq!(snapshot.completed_tasks + snapshot.failed_tasks, 6);
        assert_eq!(snapshot.progress, 100);
        assert!(snapshot.end_time.is_some());
        let summary = snapshot.result_summary.unwrap();
        assert_eq!(summary.total_rules, 6);
        assert_eq!(summary.pass_rate, 1.0);
        assert_eq!(job.results().len().await, 6);
        assert!(evaluator.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_dispatch_order_is_documents_then_rules() {
        let evaluator = Arc::new(ProbeEvaluator::default());
        let h = harness(evaluator.clone(), RecordingClient::failing(0), None);
        let job = h.job(&["d1", "d2"], 2, 1, false).await;

        h.scheduler.clone().run(job).await;

        let calls = evaluator.calls.lock().unwrap().clone();
        let expected: Vec<(String, String)> = [("d1", "r1"), ("d1", "r2"), ("d2", "r1"), ("d2", "r2")]
            .iter()
            .map(|(d, r)| (d.to_string(), r.to_string()))
            .collect();
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn test_task_failures_do_not_fail_the_job() {
        let evaluator = Arc::new(ProbeEvaluator {
            failing: HashSet::from(["r2".to_string()]),
            ..Default::default()
        });
        let h = harness(evaluator, RecordingClient::failing(0), None);
        let job = h.job(&["d1", "missing"], 3, 3, false).await;

        let status = h.scheduler.clone().run(job.clone()).await;

        assert_eq!(status, JobStatus::Completed);
        let snapshot = job.snapshot().await;
        // missing document fails all 3 of its tasks; r2 fails on d1
        assert_eq!(snapshot.failed_tasks, 4);
        assert_eq!(snapshot.completed_tasks, 2);
        let summary = snapshot.result_summary.unwrap();
        assert_eq!(summary.failed_rules, 4);
        assert!(snapshot.error_message.is_none());

        let results = job.results().results().await;
        let errors: Vec<_> = results
            .iter()
            .filter(|r| r.status == ResultStatus::Error)
            .collect();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(|r| r.threshold == 0.8 && r.score == 0.0));
    }

    #[tokio::test]
    async fn test_evaluation_timeout_records_error_result() {
        let evaluator = Arc::new(ProbeEvaluator {
            delay: Duration::from_millis(500),
            ..Default::default()
        });
        let h = harness(evaluator, RecordingClient::failing(0), Some(Duration::from_millis(10)));
        let job = h.job(&["d1"], 2, 2, false).await;

        let status = h.scheduler.clone().run(job.clone()).await;

        assert_eq!(status, JobStatus::Completed);
        let snapshot = job.snapshot().await;
        assert_eq!(snapshot.failed_tasks, 2);
        let results = job.results().results().await;
        assert!(results[0].recommendation.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_unready_evaluator_fails_job() {
        let h = harness(Arc::new(UnreadyEvaluator), RecordingClient::failing(0), None);
        let job = h.job(&["d1"], 2, 1, true).await;

        let status = h.scheduler.clone().run(job.clone()).await;

        assert_eq!(status, JobStatus::Failed);
        let snapshot = job.snapshot().await;
        assert!(snapshot.error_message.unwrap().contains("model endpoint down"));
        assert_eq!(snapshot.completed_tasks + snapshot.failed_tasks, 0);
        // Orchestration faults still notify
        h.wait_for_callbacks(1).await;
    }

    #[tokio::test]
    async fn test_worker_panic_fails_job() {
        let h = harness(Arc::new(PanickingEvaluator), RecordingClient::failing(0), None);
        let job = h.job(&["d1"], 3, 1, false).await;

        let status = h.scheduler.spawn(job.clone()).await.unwrap();

        assert_eq!(status, JobStatus::Failed);
        let snapshot = job.snapshot().await;
        assert!(snapshot.error_message.unwrap().contains("worker fault"));
    }

    #[tokio::test]
    async fn test_run_executes_once() {
        let evaluator = Arc::new(ProbeEvaluator::default());
        let h = harness(evaluator.clone(), RecordingClient::failing(0), None);
        let job = h.job(&["d1"], 2, 1, false).await;

        let first = h.scheduler.clone().run(job.clone()).await;
        let second = h.scheduler.clone().run(job.clone()).await;

        assert_eq!(first, JobStatus::Completed);
        assert_eq!(second, JobStatus::Completed);
        assert_eq!(evaluator.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_callback_does_not_change_status() {
        let h = harness(
            Arc::new(ProbeEvaluator::default()),
            RecordingClient::failing(u32::MAX),
            None,
        );
        let job = h.job(&["d1"], 1, 1, true).await;

        let status = h.scheduler.spawn(job.clone()).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        // fast_policy(2): one attempt plus two retries
        h.wait_for_callbacks(3).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.callbacks.calls(), 3);
        assert_eq!(job.status().await, JobStatus::Completed);
        assert!(job.snapshot().await.end_time.is_some());
    }

    #[tokio::test]
    async fn test_sync_job_sends_no_callback() {
        let h = harness(Arc::new(ProbeEvaluator::default()), RecordingClient::failing(0), None);
        let job = h.job(&["d1"], 1, 1, false).await;

        h.scheduler.spawn(job).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.callbacks.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_stops_dispatch() {
        let evaluator = Arc::new(GatedEvaluator::new());
        let h = harness(evaluator.clone(), RecordingClient::failing(0), None);
        let job = h.job(&["d1", "d2"], 3, 2, false).await;
        let controller = CancellationController::new(Arc::clone(&h.registry));

        let handle = h.scheduler.spawn(job.clone());
        wait_until(|| evaluator.started.load(Ordering::SeqCst) == 2).await;

        assert_eq!(
            controller.cancel(job.id()).await.unwrap(),
            CancelOutcome::Requested
        );
        assert_eq!(job.status().await, JobStatus::Running);
        evaluator.gate.add_permits(10);

        let status = handle.await.unwrap();

        assert_eq!(status, JobStatus::Cancelled);
        let snapshot = job.snapshot().await;
        assert_eq!(snapshot.completed_tasks + snapshot.failed_tasks, 2);
        assert!(snapshot.completed_tasks + snapshot.failed_tasks < snapshot.total_tasks);
        assert_eq!(evaluator.started.load(Ordering::SeqCst), 2);
        assert_eq!(job.results().len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_cancels_transition_once() {
        let evaluator = Arc::new(GatedEvaluator::new());
        let h = harness(evaluator.clone(), RecordingClient::failing(0), None);
        let job = h.job(&["d1", "d2"], 3, 2, true).await;
        let controller = CancellationController::new(Arc::clone(&h.registry));

        let handle = h.scheduler.spawn(job.clone());
        wait_until(|| evaluator.started.load(Ordering::SeqCst) == 2).await;

        let (first, second) = tokio::join!(controller.cancel(job.id()), controller.cancel(job.id()));
        let outcomes = [first.unwrap(), second.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| o.accepted()).count(), 1);

        evaluator.gate.add_permits(10);
        assert_eq!(handle.await.unwrap(), JobStatus::Cancelled);

        // A cancel after the fact sees the terminal state
        assert_eq!(
            controller.cancel(job.id()).await.unwrap(),
            CancelOutcome::AlreadyTerminal(JobStatus::Cancelled)
        );

        // Exactly one terminal transition means exactly one callback
        h.wait_for_callbacks(1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.callbacks.calls(), 1);
        let payloads = h.callbacks.payloads.lock().unwrap();
        assert_eq!(payloads[0]["status"], "CANCELLED");
    }

    #[tokio::test]
    async fn test_cancel_before_run_dispatches_nothing() {
        let evaluator = Arc::new(ProbeEvaluator::default());
        let h = harness(evaluator.clone(), RecordingClient::failing(0), None);
        let job = h.job(&["d1"], 3, 2, false).await;
        CancellationController::new(Arc::clone(&h.registry))
            .cancel(job.id())
            .await
            .unwrap();

        let status = h.scheduler.clone().run(job.clone()).await;

        assert_eq!(status, JobStatus::Cancelled);
        assert!(evaluator.calls.lock().unwrap().is_empty());
        let summary = job.summary().await.unwrap();
        assert_eq!(summary.total_rules, 0);
        assert_eq!(summary.pass_rate, 0.0);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_while_running() {
        let evaluator = Arc::new(ProbeEvaluator {
            delay: Duration::from_millis(2),
            ..Default::default()
        });
        let h = harness(evaluator, RecordingClient::failing(0), None);
        let job = h.job(&["d1", "d2", "d3", "d4"], 5, 3, false).await;

        let handle = h.scheduler.spawn(job.clone());
        let mut last = 0;
        loop {
            let snapshot = job.snapshot().await;
            assert!(snapshot.progress >= last);
            assert!(snapshot.progress <= 100);
            assert!(snapshot.completed_tasks + snapshot.failed_tasks <= snapshot.total_tasks);
            if snapshot.status.is_terminal() {
                assert_eq!(snapshot.progress, 100);
                break;
            }
            last = snapshot.progress;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        handle.await.unwrap();
    }
}
