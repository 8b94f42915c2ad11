use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::error::AuditError;

/// Lifecycle state of an audit job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELLED" | "CANCELED" => Ok(JobStatus::Cancelled),
            _ => Err(AuditError::validation(
                "status",
                format!(
                    "Invalid job status '{}'. Valid values are: PENDING, RUNNING, COMPLETED, FAILED, CANCELLED",
                    s
                ),
            )),
        }
    }
}

/// Verdict of a single (document, rule) evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Passed,
    Failed,
    Warning,
    Error,
}

/// How a piece of evidence was located in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Exact,
    Keyword,
    Semantic,
}

/// Character range of an evidence snippet inside its paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub text: String,
    pub page: u32,
    pub paragraph: u32,
    pub span: TextSpan,
    pub match_type: MatchType,
}

/// A single audit rule as resolved from a rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Terms the document is expected to cover
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Scores within this distance below the threshold are warnings
    #[serde(default = "default_warning_margin")]
    pub warning_margin: f64,
    #[serde(default)]
    pub recommendation: Option<String>,
}

fn default_threshold() -> f64 {
    0.8
}

fn default_warning_margin() -> f64 {
    0.2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub page: u32,
    pub text: String,
}

/// A product document to be audited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

/// Output of a rule evaluator for one task
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: ResultStatus,
    pub score: f64,
    pub threshold: f64,
    pub evidences: Vec<Evidence>,
    pub recommendation: Option<String>,
}

/// One (document, rule) evaluation unit
#[derive(Debug, Clone)]
pub struct Task {
    pub index: usize,
    pub job_id: String,
    pub document_id: String,
    pub rule: Rule,
}

/// Write-once record produced by evaluating a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub result_id: String,
    pub job_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub document_id: String,
    pub status: ResultStatus,
    pub score: f64,
    pub threshold: f64,
    pub evidences: Vec<Evidence>,
    pub recommendation: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub audit_time: Timestamp,
}

impl RuleResult {
    pub fn from_verdict(task: &Task, verdict: Verdict) -> Self {
        Self {
            result_id: Uuid::new_v4().to_string(),
            job_id: task.job_id.clone(),
            rule_id: task.rule.id.clone(),
            rule_name: task.rule.name.clone(),
            document_id: task.document_id.clone(),
            status: verdict.status,
            score: verdict.score,
            threshold: verdict.threshold,
            evidences: verdict.evidences,
            recommendation: verdict.recommendation,
            audit_time: Timestamp::now(),
        }
    }

    /// ERROR record for a task whose evaluation could not complete
    pub fn from_error(task: &Task, message: &str) -> Self {
        Self {
            result_id: Uuid::new_v4().to_string(),
            job_id: task.job_id.clone(),
            rule_id: task.rule.id.clone(),
            rule_name: task.rule.name.clone(),
            document_id: task.document_id.clone(),
            status: ResultStatus::Error,
            score: 0.0,
            threshold: task.rule.threshold,
            evidences: Vec::new(),
            recommendation: Some(format!("Evaluation could not be completed: {}", message)),
            audit_time: Timestamp::now(),
        }
    }
}

/// Job-level statistics over the full result set
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub total_rules: u64,
    pub passed_rules: u64,
    pub failed_rules: u64,
    pub warning_rules: u64,
    pub pass_rate: f64,
}

impl JobSummary {
    pub fn from_results(results: &[RuleResult]) -> Self {
        let mut summary = JobSummary {
            total_rules: results.len() as u64,
            ..Default::default()
        };

        for result in results {
            match result.status {
                ResultStatus::Passed => summary.passed_rules += 1,
                ResultStatus::Failed | ResultStatus::Error => summary.failed_rules += 1,
                ResultStatus::Warning => summary.warning_rules += 1,
            }
        }

        summary.pass_rate = if summary.total_rules == 0 {
            0.0
        } else {
            summary.passed_rules as f64 / summary.total_rules as f64
        };

        summary
    }
}

/// Caller-supplied description of a job to create
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub name: String,
    pub description: Option<String>,
    pub rule_set_id: String,
    pub document_ids: Vec<String>,
    /// `None` falls back to the configured default
    pub concurrency: Option<u32>,
    pub is_async: bool,
    pub callback_url: Option<String>,
}

/// Point-in-time, internally consistent view of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    pub job_name: String,
    pub description: Option<String>,
    pub rule_set_id: String,
    pub document_ids: Vec<String>,
    pub concurrency: u32,
    #[serde(rename = "async")]
    pub is_async: bool,
    pub callback_url: Option<String>,
    pub status: JobStatus,
    pub progress: u8,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub error_message: Option<String>,
    pub result_summary: Option<JobSummary>,
}
