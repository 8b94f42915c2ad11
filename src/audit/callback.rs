use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

use crate::audit::types::JobSnapshot;
use crate::external::CallbackClient;

/// Exponential backoff for callback delivery
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `initial * multiplier^attempt`,
    /// capped at `max_delay`, plus up to 10% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_ceiling = base.as_millis() as u64 / 10;
        if jitter_ceiling == 0 {
            return base;
        }
        let jitter = rand::rng().random_range(0..=jitter_ceiling);
        base + Duration::from_millis(jitter)
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Outcome of one delivery, after all retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: bool,
    pub attempts: u32,
}

/// Posts terminal job snapshots to caller-supplied URLs.
///
/// Delivery runs on its own task and never touches job state.
#[derive(Clone)]
pub struct CallbackNotifier {
    client: Arc<dyn CallbackClient>,
    policy: RetryPolicy,
}

impl CallbackNotifier {
    pub fn new(client: Arc<dyn CallbackClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Starts delivery in the background and returns immediately.
    pub fn dispatch(&self, url: String, snapshot: JobSnapshot) -> JoinHandle<DeliveryReport> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.deliver(&url, &snapshot).await })
    }

    pub async fn deliver(&self, url: &str, snapshot: &JobSnapshot) -> DeliveryReport {
        let payload = match serde_json::to_value(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(job_id = %snapshot.job_id, error = %e, "Callback payload could not be serialized");
                return DeliveryReport {
                    delivered: false,
                    attempts: 0,
                };
            }
        };

        let max_attempts = self.policy.max_retries.saturating_add(1);
        for attempt in 1..=max_attempts {
            match self.client.post(url, &payload).await {
                Ok(()) => {
                    tracing::info!(
                        job_id = %snapshot.job_id,
                        status = %snapshot.status,
                        attempt,
                        "Callback delivered"
                    );
                    return DeliveryReport {
                        delivered: true,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %snapshot.job_id,
                        url,
                        attempt,
                        error = %e,
                        "Callback attempt failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt - 1)).await;
                    }
                }
            }
        }

        tracing::error!(
            job_id = %snapshot.job_id,
            url,
            attempts = max_attempts,
            "Callback delivery exhausted retries"
        );
        DeliveryReport {
            delivered: false,
            attempts: max_attempts,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audit::types::JobStatus;
    use crate::external::{ExternalError, ExternalResult};
    use async_trait::async_trait;
    use jiff::Timestamp;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Records every post and fails the first `failures` of them
    pub(crate) struct RecordingClient {
        failures: u32,
        calls: AtomicU32,
        pub(crate) payloads: Mutex<Vec<serde_json::Value>>,
    }

    impl RecordingClient {
        pub(crate) fn failing(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                payloads: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CallbackClient for RecordingClient {
        async fn post(&self, _url: &str, payload: &serde_json::Value) -> ExternalResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().unwrap().push(payload.clone());
            if call < self.failures {
                Err(ExternalError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    pub(crate) fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(5),
        }
    }

    fn snapshot() -> JobSnapshot {
        JobSnapshot {
            job_id: "job-1".to_string(),
            job_name: "job".to_string(),
            description: None,
            rule_set_id: "rs".to_string(),
            document_ids: vec!["doc".to_string()],
            concurrency: 1,
            is_async: true,
            callback_url: Some("http://127.0.0.1:9/hook".to_string()),
            status: JobStatus::Completed,
            progress: 100,
            total_tasks: 1,
            completed_tasks: 1,
            failed_tasks: 0,
            start_time: Timestamp::now(),
            end_time: Some(Timestamp::now()),
            error_message: None,
            result_summary: None,
        }
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(1_000),
        };
        assert_eq!(policy.base_delay(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(800));
        assert_eq!(policy.base_delay(4), Duration::from_millis(1_000));
        assert_eq!(policy.base_delay(30), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let policy = RetryPolicy::default();
        for attempt in 0..5 {
            let base = policy.base_delay(attempt);
            let delay = policy.delay_for(attempt);
            assert!(delay >= base);
            assert!(delay <= base + base / 10);
        }
    }

    #[tokio::test]
    async fn test_delivers_on_first_attempt() {
        let client = Arc::new(RecordingClient::failing(0));
        let notifier = CallbackNotifier::new(client.clone(), fast_policy(3));

        let report = notifier.deliver("http://hook", &snapshot()).await;

        assert!(report.delivered);
        assert_eq!(report.attempts, 1);
        let payloads = client.payloads.lock().unwrap();
        assert_eq!(payloads[0]["jobId"], "job-1");
        assert_eq!(payloads[0]["status"], "COMPLETED");
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let client = Arc::new(RecordingClient::failing(2));
        let notifier = CallbackNotifier::new(client.clone(), fast_policy(3));

        let report = notifier.deliver("http://hook", &snapshot()).await;

        assert!(report.delivered);
        assert_eq!(report.attempts, 3);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let client = Arc::new(RecordingClient::failing(u32::MAX));
        let notifier = CallbackNotifier::new(client.clone(), fast_policy(2));

        let report = notifier
            .dispatch("http://hook".to_string(), snapshot())
            .await
            .unwrap();

        assert!(!report.delivered);
        assert_eq!(report.attempts, 3);
        assert_eq!(client.calls(), 3);
    }
}
