//! Audit job request handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::JOB_TAG;
use crate::api::dto::{
    CancelJobResponse, CreateJobRequest, ErrorResponse, ExportParams, JobListParams, JobResponse,
    PagedResponse,
};
use crate::audit::{ExportFormat, PageRequest, RuleResult};
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};

pub fn job_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_jobs, create_job))
        .routes(routes!(get_job))
        .routes(routes!(get_job_results))
        .routes(routes!(export_job_results))
        .routes(routes!(cancel_job))
}

/// GET /api/jobs - List jobs, newest first
#[utoipa::path(
    get,
    path = "/",
    tag = JOB_TAG,
    params(JobListParams),
    responses(
        (status = 200, description = "Page of jobs", body = PagedResponse<JobResponse>),
        (status = 400, description = "Invalid paging or status filter", body = ErrorResponse)
    )
)]
async fn list_jobs(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<JobListParams>,
) -> AppResult<Json<PagedResponse<JobResponse>>> {
    let filter = params.filter()?;
    let page = state
        .services
        .audit
        .list_jobs(
            filter,
            PageRequest {
                page: params.page,
                page_size: params.page_size,
            },
        )
        .await;

    let items = page.items.into_iter().map(JobResponse::from).collect();
    Ok(Json(PagedResponse::new(
        items,
        params.page,
        params.page_size,
        page.total,
    )))
}

/// POST /api/jobs - Create and start an audit job
///
/// Async jobs answer 202 immediately. Sync jobs answer 201 once finished, or
/// 202 if the request timeout elapses first.
#[utoipa::path(
    post,
    path = "/",
    tag = JOB_TAG,
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Synchronous job finished", body = JobResponse),
        (status = 202, description = "Job accepted and running", body = JobResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Rule set not found", body = ErrorResponse)
    )
)]
async fn create_job(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<JobResponse>)> {
    let snapshot = state.services.audit.create_job(req.into_spec()).await?;

    let status = if !snapshot.is_async && snapshot.status.is_terminal() {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(JobResponse::from(snapshot))))
}

/// GET /api/jobs/{job_id} - Job status and progress
#[utoipa::path(
    get,
    path = "/{job_id}",
    tag = JOB_TAG,
    params(("job_id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job found", body = JobResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobResponse>> {
    let snapshot = state.services.audit.get_job(&job_id).await?;
    Ok(Json(JobResponse::from(snapshot)))
}

/// GET /api/jobs/{job_id}/results - Results recorded so far
#[utoipa::path(
    get,
    path = "/{job_id}/results",
    tag = JOB_TAG,
    params(("job_id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Per-task results", body = Vec<RuleResult>),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
async fn get_job_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Vec<RuleResult>>> {
    let results = state.services.audit.job_results(&job_id).await?;
    Ok(Json(results))
}

/// POST /api/jobs/{job_id}/export - Download results in the requested format
#[utoipa::path(
    post,
    path = "/{job_id}/export",
    tag = JOB_TAG,
    params(
        ("job_id" = String, Path, description = "Job id"),
        ExportParams
    ),
    responses(
        (status = 200, description = "Export file", content_type = "application/octet-stream"),
        (status = 400, description = "Unknown format", body = ErrorResponse),
        (status = 404, description = "Job not found or no results yet", body = ErrorResponse),
        (status = 422, description = "Format not rendered by this deployment", body = ErrorResponse)
    )
)]
async fn export_job_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<ExportParams>,
) -> AppResult<Response> {
    let format: ExportFormat = params.format.parse()?;
    let artifact = state.services.audit.export_job(&job_id, format).await?;

    let headers = [
        (header::CONTENT_TYPE, artifact.content_type),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        ),
    ];
    Ok((headers, artifact.content).into_response())
}

/// POST /api/jobs/{job_id}/cancel - Request cooperative cancellation
///
/// Cancelling a finished job succeeds without changing it.
#[utoipa::path(
    post,
    path = "/{job_id}/cancel",
    tag = JOB_TAG,
    params(("job_id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Cancel request acknowledged", body = CancelJobResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<CancelJobResponse>> {
    let (outcome, snapshot) = state.services.audit.cancel_job(&job_id).await?;
    Ok(Json(CancelJobResponse::new(outcome, &snapshot)))
}
