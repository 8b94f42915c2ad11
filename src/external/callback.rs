//! Callback delivery over HTTP.
//!
//! Posts job snapshots with the shared `HTTP_CLIENT`.

use std::time::Duration;

use async_trait::async_trait;

use super::client::HTTP_CLIENT;
use super::{CallbackClient, ExternalError, ExternalResult};

#[derive(Debug, Clone)]
pub struct HttpCallbackClient {
    timeout: Duration,
}

impl HttpCallbackClient {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpCallbackClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallbackClient for HttpCallbackClient {
    /// Any non-2xx response counts as a failed attempt
    async fn post(&self, url: &str, payload: &serde_json::Value) -> ExternalResult<()> {
        let response = HTTP_CLIENT
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalError::Status(status.as_u16()));
        }
        tracing::debug!(url, status = status.as_u16(), "Callback acknowledged");
        Ok(())
    }
}
