use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::error::{AuditError, AuditResult};
use crate::audit::registry::JobEntry;
use crate::audit::types::{JobSummary, RuleResult};
use crate::external::{Exporter, ExternalError};

/// Closed set of export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Json,
    Pdf,
    Word,
    Excel,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Pdf => "PDF",
            ExportFormat::Word => "WORD",
            ExportFormat::Excel => "EXCEL",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Word => "docx",
            ExportFormat::Excel => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JSON" => Ok(ExportFormat::Json),
            "PDF" => Ok(ExportFormat::Pdf),
            "WORD" | "DOCX" => Ok(ExportFormat::Word),
            "EXCEL" | "XLSX" => Ok(ExportFormat::Excel),
            _ => Err(AuditError::validation(
                "format",
                format!(
                    "Unsupported export format '{}'. Valid values are: JSON, PDF, WORD, EXCEL",
                    s
                ),
            )),
        }
    }
}

/// Rendered export, ready to be streamed to a client
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Body of a JSON export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport {
    pub job_id: String,
    pub summary: JobSummary,
    pub results: Vec<RuleResult>,
}

pub struct ExportGateway {
    exporter: Arc<dyn Exporter>,
}

impl ExportGateway {
    pub fn new(exporter: Arc<dyn Exporter>) -> Self {
        Self { exporter }
    }

    /// Exports the current result set of a job.
    ///
    /// A running job is exported with a provisional summary computed from the
    /// results recorded so far.
    pub async fn export(&self, job: &JobEntry, format: ExportFormat) -> AuditResult<ExportArtifact> {
        let results = job.results().results().await;
        if results.is_empty() {
            return Err(AuditError::NotFound {
                entity: "Results",
                id: job.id().to_string(),
            });
        }

        let summary = match job.summary().await {
            Some(summary) => summary,
            None => JobSummary::from_results(&results),
        };

        let mut artifact = match format {
            ExportFormat::Json => {
                let body = JsonExport {
                    job_id: job.id().to_string(),
                    summary,
                    results,
                };
                ExportArtifact {
                    format,
                    file_name: String::new(),
                    content_type: format.content_type().to_string(),
                    content: serde_json::to_vec_pretty(&body)?,
                }
            }
            _ => self
                .exporter
                .render(format, &results, &summary)
                .await
                .map_err(|e| match e {
                    ExternalError::Unsupported(_) => AuditError::ExportUnavailable(format),
                    other => AuditError::Export(other.to_string()),
                })?,
        };

        if artifact.file_name.is_empty() {
            artifact.file_name = format!("audit-{}.{}", job.id(), format.extension());
        }

        tracing::debug!(
            job_id = %job.id(),
            %format,
            bytes = artifact.content.len(),
            "Export rendered"
        );
        Ok(artifact)
    }
}
