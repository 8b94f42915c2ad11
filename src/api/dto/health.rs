//! Health check DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::JobCounts;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "status": "healthy",
    "name": "auditor-rs",
    "version": "0.1.0",
    "timestamp": "2026-01-01T12:00:00Z",
    "uptimeSeconds": 42,
    "jobs": {"pending": 0, "running": 1, "completed": 10, "failed": 0, "cancelled": 2}
}))]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub name: String,
    pub version: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub jobs: JobCountsResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Jobs currently held in memory, by status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobCountsResponse {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl From<JobCounts> for JobCountsResponse {
    fn from(counts: JobCounts) -> Self {
        Self {
            pending: counts.pending,
            running: counts.running,
            completed: counts.completed,
            failed: counts.failed,
            cancelled: counts.cancelled,
        }
    }
}
