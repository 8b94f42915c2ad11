//! Service layer shared by the HTTP handlers and the CLI.

mod audit_service;

pub use audit_service::{AuditOptions, AuditService};

use crate::config::Settings;
use crate::external::Collaborators;

impl AuditOptions {
    /// Options for the HTTP server; synchronous creates are bounded by the
    /// request timeout.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            limits: settings.audit.job_limits(),
            retry_policy: settings.audit.callback.retry_policy(),
            task_timeout: settings.audit.task_timeout(),
            sync_wait: Some(settings.server.timeout()),
        }
    }
}

/// Aggregates all services. Cloning is cheap; everything inside is `Arc`.
#[derive(Clone)]
pub struct Services {
    pub audit: AuditService,
}

impl Services {
    pub fn new(settings: &Settings, collaborators: Collaborators) -> Self {
        Self::with_options(collaborators, AuditOptions::from_settings(settings))
    }

    pub fn with_options(collaborators: Collaborators, options: AuditOptions) -> Self {
        Self {
            audit: AuditService::new(collaborators, options),
        }
    }
}
