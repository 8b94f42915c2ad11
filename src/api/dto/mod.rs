//! Data Transfer Objects for API requests and responses.

mod error;
mod health;
mod job;
mod pagination;

pub use error::ErrorResponse;
pub use health::{HealthResponse, HealthStatus, JobCountsResponse};
pub use job::{CancelJobResponse, CreateJobRequest, ExportParams, JobListParams, JobResponse};
pub use pagination::{PagedResponse, PaginationMeta};
