//! Health check handler.

use axum::{Json, extract::State};
use jiff::Timestamp;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::HEALTH_TAG;
use crate::api::dto::{HealthResponse, HealthStatus};
use crate::build;
use crate::state::AppState;

pub fn health_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(health_check))
}

/// GET /api/health - Liveness with in-memory job counts
#[utoipa::path(
    get,
    path = "/health",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = state.services.audit.job_counts().await;

    Json(HealthResponse {
        status: HealthStatus::Healthy,
        name: build::PROJECT_NAME.to_string(),
        version: build::PKG_VERSION.to_string(),
        timestamp: Timestamp::now().to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        jobs: counts.into(),
    })
}
