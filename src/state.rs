//! Shared state handed to every request handler.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::external::{Catalog, Collaborators};
use crate::services::Services;

/// Cloning is cheap; services hold their stores behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// Process start, reported as uptime by the health endpoint
    pub started_at: Instant,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            started_at: Instant::now(),
        }
    }

    /// Builds the state from settings, loading the catalog file if one is
    /// configured.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let collaborators = load_collaborators(settings).await?;
        Ok(Self::new(Services::new(settings, collaborators)))
    }
}

/// Catalog-backed collaborators shared by the server and the `run` command
pub async fn load_collaborators(settings: &Settings) -> anyhow::Result<Collaborators> {
    let catalog = match settings.catalog.path.as_deref() {
        Some(path) => Catalog::from_path(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load catalog {}: {}", path, e))?,
        None => {
            tracing::warn!("No catalog configured; every rule set lookup will fail");
            Catalog::empty()
        }
    };

    Ok(Collaborators::from_catalog(
        Arc::new(catalog),
        settings.audit.callback.timeout(),
    ))
}
