use utoipa::{Modify, OpenApi};

use crate::build;

pub const JOB_TAG: &str = "Jobs";
pub const HEALTH_TAG: &str = "Health";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Auditor",
        description = "Audit jobs for insurance product documents",
    ),
    modifiers(&BuildInfoAddon),
    components(
        schemas(
            crate::api::dto::ErrorResponse,
            crate::error::ValidationFieldError,
        )
    ),
    tags(
        (name = JOB_TAG, description = "Audit job lifecycle, results and export"),
        (name = HEALTH_TAG, description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;

/// Stamps the crate version from build metadata
pub struct BuildInfoAddon;

impl Modify for BuildInfoAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.version = build::PKG_VERSION.to_string();
    }
}
