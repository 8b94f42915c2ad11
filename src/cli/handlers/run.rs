//! `run`: execute one synchronous audit job from the command line.

use std::path::PathBuf;

use crate::api::dto::JobResponse;
use crate::audit::{ExportFormat, JobSnapshot, JobSpec};
use crate::config::Settings;
use crate::services::{AuditOptions, AuditService};
use crate::state::load_collaborators;

/// Job parameters taken from the command line
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub name: String,
    pub rule_set_id: String,
    pub document_ids: Vec<String>,
    pub concurrency: Option<u32>,
    pub output: Option<PathBuf>,
}

pub struct RunCommandHandler {
    config: Settings,
    request: RunRequest,
}

impl RunCommandHandler {
    pub fn new(config: Settings, request: RunRequest) -> Self {
        Self { config, request }
    }

    /// Runs the job to completion, writes the JSON export if requested and
    /// prints the final snapshot to stdout.
    pub async fn execute(&self) -> anyhow::Result<JobSnapshot> {
        let snapshot = self.run_job().await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&JobResponse::from(snapshot.clone()))?
        );
        Ok(snapshot)
    }

    async fn run_job(&self) -> anyhow::Result<JobSnapshot> {
        let collaborators = load_collaborators(&self.config).await?;
        // No wait bound here; the command exists to see the job finish
        let options = AuditOptions {
            sync_wait: None,
            ..AuditOptions::from_settings(&self.config)
        };
        let service = AuditService::new(collaborators, options);

        let spec = JobSpec {
            name: self.request.name.clone(),
            rule_set_id: self.request.rule_set_id.clone(),
            document_ids: self.request.document_ids.clone(),
            concurrency: self.request.concurrency,
            is_async: false,
            ..Default::default()
        };
        let snapshot = service.create_job(spec).await?;
        tracing::info!(
            job_id = %snapshot.job_id,
            status = %snapshot.status,
            completed = snapshot.completed_tasks,
            failed = snapshot.failed_tasks,
            "Audit job finished"
        );

        if let Some(path) = &self.request.output {
            let artifact = service.export_job(&snapshot.job_id, ExportFormat::Json).await?;
            tokio::fs::write(path, &artifact.content).await?;
            tracing::info!(path = %path.display(), bytes = artifact.content.len(), "Results written");
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::audit::JobStatus;

    const CATALOG: &str = r#"{
        "ruleSets": [{"id": "health", "rules": [
            {"id": "r1", "name": "Waiting period", "keywords": ["waiting period"]},
            {"id": "r2", "name": "Exclusions", "keywords": ["exclusions"]}
        ]}],
        "documents": [
            {"id": "doc-a", "paragraphs": [{"page": 1, "text": "Waiting period: 30 days."}]},
            {"id": "doc-b", "paragraphs": [{"page": 2, "text": "No exclusions."}]}
        ]
    }"#;

    fn settings_with_catalog() -> (Settings, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let mut settings = Settings::default();
        settings.catalog.path = Some(file.path().display().to_string());
        (settings, file)
    }

    fn request(rule_set_id: &str, output: Option<PathBuf>) -> RunRequest {
        RunRequest {
            name: "cli-test".to_string(),
            rule_set_id: rule_set_id.to_string(),
            document_ids: vec!["doc-a".to_string(), "doc-b".to_string()],
            concurrency: Some(2),
            output,
        }
    }

    #[tokio::test]
    async fn test_run_writes_json_export() {
        let (settings, _catalog) = settings_with_catalog();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.json");

        let handler = RunCommandHandler::new(settings, request("health", Some(output.clone())));
        let snapshot = handler.run_job().await.unwrap();

        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.total_tasks, 4);
        assert_eq!(snapshot.completed_tasks, 4);

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(written["jobId"], snapshot.job_id.as_str());
    }

    #[tokio::test]
    async fn test_run_unknown_rule_set() {
        let (settings, _catalog) = settings_with_catalog();
        let handler = RunCommandHandler::new(settings, request("motor", None));
        assert!(handler.run_job().await.is_err());
    }
}
