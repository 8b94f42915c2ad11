use std::sync::LazyLock;
use std::time::Duration;

use crate::build;

/// Shared HTTP client for outbound calls.
///
/// Built lazily on first use so connections are pooled across callbacks.
/// Per-request timeouts override the client default.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(user_agent())
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
});

fn user_agent() -> String {
    format!("{}/{}", build::PROJECT_NAME, build::PKG_VERSION)
}
