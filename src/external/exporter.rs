use async_trait::async_trait;

use super::{Exporter, ExternalError, ExternalResult};
use crate::audit::export::{ExportArtifact, ExportFormat};
use crate::audit::types::{JobSummary, RuleResult};

/// Binary exporter for deployments without a document renderer.
///
/// Every call reports the format as unsupported; JSON exports never reach an
/// exporter.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableExporter;

#[async_trait]
impl Exporter for UnavailableExporter {
    async fn render(
        &self,
        format: ExportFormat,
        _results: &[RuleResult],
        _summary: &JobSummary,
    ) -> ExternalResult<ExportArtifact> {
        Err(ExternalError::Unsupported(format!(
            "no renderer configured for {}",
            format
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_unsupported() {
        let err = UnavailableExporter
            .render(ExportFormat::Word, &[], &JobSummary::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExternalError::Unsupported(ref m) if m.contains("WORD")));
    }
}
