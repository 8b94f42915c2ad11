use tokio::sync::RwLock;

use crate::audit::types::{JobSummary, RuleResult};

/// Append-only result set of one job
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: RwLock<Vec<RuleResult>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result. Append order follows completion, not submission.
    pub async fn record(&self, result: RuleResult) {
        self.results.write().await.push(result);
    }

    pub async fn results(&self) -> Vec<RuleResult> {
        self.results.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn summarize(&self) -> JobSummary {
        JobSummary::from_results(&self.results.read().await)
    }
}
