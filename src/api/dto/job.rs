//! Audit job DTOs for API requests and responses.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::audit::{CancelOutcome, JobFilter, JobSnapshot, JobSpec, JobStatus, JobSummary};
use crate::error::AppResult;

// ============================================================================
// Request DTOs
// ============================================================================

/// Request body for creating an audit job.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "jobName": "Q3 health products",
    "ruleSetId": "health-basic",
    "documentIds": ["policy-001", "policy-002"],
    "concurrency": 5,
    "async": true,
    "callbackUrl": "https://hooks.example.com/audit"
}))]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 255, message = "Job name must be between 1 and 255 characters"))]
    pub job_name: String,

    #[validate(length(min = 1, message = "Rule set id is required"))]
    pub rule_set_id: String,

    #[validate(length(min = 1, message = "At least one document id is required"))]
    pub document_ids: Vec<String>,

    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,

    /// Worker count; the configured default applies when omitted
    #[validate(range(min = 1, message = "Concurrency must be at least 1"))]
    #[schema(minimum = 1, example = 5)]
    pub concurrency: Option<u32>,

    #[serde(rename = "async", default = "default_async")]
    pub is_async: bool,

    #[validate(url(message = "Callback URL must be a valid URL"))]
    pub callback_url: Option<String>,
}

fn default_async() -> bool {
    true
}

impl CreateJobRequest {
    pub fn into_spec(self) -> JobSpec {
        JobSpec {
            name: self.job_name,
            description: self.description,
            rule_set_id: self.rule_set_id,
            document_ids: self.document_ids,
            concurrency: self.concurrency,
            is_async: self.is_async,
            callback_url: self.callback_url,
        }
    }
}

/// Query parameters for listing jobs.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct JobListParams {
    /// Page number (1-based)
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    #[param(minimum = 1, example = 1)]
    pub page: u32,

    /// Items per page (max 100)
    #[serde(default = "default_page_size", alias = "size")]
    #[validate(range(min = 1, max = 100, message = "Page size must be between 1 and 100"))]
    #[param(minimum = 1, maximum = 100, example = 20)]
    pub page_size: u32,

    /// Only jobs in this status (PENDING, RUNNING, COMPLETED, FAILED, CANCELLED)
    #[param(example = "RUNNING")]
    pub status: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl JobListParams {
    pub fn filter(&self) -> AppResult<JobFilter> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<JobStatus>()?),
        };
        Ok(JobFilter { status })
    }
}

/// Query parameters for exporting results.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportParams {
    /// JSON, PDF, WORD or EXCEL
    #[serde(default = "default_format")]
    #[param(example = "JSON")]
    pub format: String,
}

fn default_format() -> String {
    "JSON".to_string()
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Point-in-time view of an audit job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
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
    /// Percent of tasks finished, 0 to 100
    #[schema(minimum = 0, maximum = 100)]
    pub progress: u8,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    #[schema(value_type = String, format = DateTime)]
    pub start_time: Timestamp,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub end_time: Option<Timestamp>,
    pub error_message: Option<String>,
    pub result_summary: Option<JobSummary>,
}

impl From<JobSnapshot> for JobResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            job_id: snapshot.job_id,
            job_name: snapshot.job_name,
            description: snapshot.description,
            rule_set_id: snapshot.rule_set_id,
            document_ids: snapshot.document_ids,
            concurrency: snapshot.concurrency,
            is_async: snapshot.is_async,
            callback_url: snapshot.callback_url,
            status: snapshot.status,
            progress: snapshot.progress,
            total_tasks: snapshot.total_tasks,
            completed_tasks: snapshot.completed_tasks,
            failed_tasks: snapshot.failed_tasks,
            start_time: snapshot.start_time,
            end_time: snapshot.end_time,
            error_message: snapshot.error_message,
            result_summary: snapshot.result_summary,
        }
    }
}

/// Acknowledgement of a cancel request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelJobResponse {
    pub job_id: String,
    /// Status right after the request; the scheduler moves the job to
    /// CANCELLED once in-flight tasks drain
    pub status: JobStatus,
    /// Whether this request set the cancel flag
    pub accepted: bool,
    pub message: String,
}

impl CancelJobResponse {
    pub fn new(outcome: CancelOutcome, snapshot: &JobSnapshot) -> Self {
        let message = match outcome {
            CancelOutcome::Requested => "Cancellation requested".to_string(),
            CancelOutcome::AlreadyRequested => "Cancellation already requested".to_string(),
            CancelOutcome::AlreadyTerminal(status) => {
                format!("Job already finished with status {}", status)
            }
        };

        Self {
            job_id: snapshot.job_id.clone(),
            status: snapshot.status,
            accepted: outcome.accepted(),
            message,
        }
    }
}
