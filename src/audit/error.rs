use thiserror::Error;

use crate::audit::export::ExportFormat;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Malformed job request; the job is never created
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Failure of a single (document, rule) evaluation
    #[error("Evaluation of rule {rule_id} on document {document_id} failed: {message}")]
    Task {
        document_id: String,
        rule_id: String,
        message: String,
    },

    #[error("Orchestration fault: {0}")]
    Orchestration(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Export format {0} is not rendered by this deployment")]
    ExportUnavailable(ExportFormat),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuditError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AuditError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        AuditError::NotFound {
            entity: "Job",
            id: job_id.into(),
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
