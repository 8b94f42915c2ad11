//! Error-to-response mapping.
//!
//! `AppError` renders to an [`ErrorResponse`] body and also stores that body
//! in the response extensions. [`global_error_handler`] then stamps the
//! request id on it and converts any remaining plain-text error (unknown
//! route, wrong method) into the same JSON shape.

use axum::{
    Json,
    body::to_bytes,
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::RequestId;
use crate::api::dto::ErrorResponse;
use crate::error::AppError;

/// Plain-text error bodies larger than this are not echoed back
const MAX_ERROR_BODY: usize = 16 * 1024;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = error_to_status_code(&self);
        let code = error_to_code(&self);
        let body = match &self {
            AppError::NotFound {
                entity,
                field,
                value,
            } => ErrorResponse::not_found(entity, field, value),
            AppError::Validation { field, reason } => {
                ErrorResponse::new(code, format!("Validation failed for {}", field))
                    .with_details(json!({ "field": field, "reason": reason }))
            }
            AppError::ValidationErrors { errors } => ErrorResponse::validation(errors),
            AppError::BadRequest { message } => ErrorResponse::new(code, message.clone()),
            AppError::UnprocessableContent { message } => {
                ErrorResponse::new(code, message.clone())
            }
            AppError::Configuration { key, source } => {
                tracing::error!(key, error = ?source, "Configuration error while serving request");
                ErrorResponse::new(code, format!("Configuration error: {}", key))
            }
            AppError::Internal { source } => {
                tracing::error!(error = ?source, "Internal error while serving request");
                ErrorResponse::new(code, "An internal error occurred")
            }
        };

        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Validation { .. } | AppError::ValidationErrors { .. } => StatusCode::BAD_REQUEST,
        AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::UnprocessableContent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::Configuration { .. } | AppError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_to_code(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound { .. } => "NOT_FOUND",
        AppError::Validation { .. } | AppError::ValidationErrors { .. } => "VALIDATION_ERROR",
        AppError::BadRequest { .. } => "BAD_REQUEST",
        AppError::UnprocessableContent { .. } => "UNPROCESSABLE_CONTENT",
        AppError::Configuration { .. } => "CONFIGURATION_ERROR",
        AppError::Internal { .. } => "INTERNAL_ERROR",
    }
}

fn fallback_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        StatusCode::REQUEST_TIMEOUT => "REQUEST_TIMEOUT",
        StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
        s if s.is_server_error() => "INTERNAL_SERVER_ERROR",
        _ => "UNKNOWN_ERROR",
    }
}

fn fallback_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

/// Rebuilds the body, keeping the original headers except content framing
fn render(status: StatusCode, headers: HeaderMap, body: ErrorResponse) -> Response {
    let mut response = (status, Json(body)).into_response();
    for (name, value) in headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
    response
}

/// Normalizes every error response to `ErrorResponse` JSON carrying the
/// request id.
pub async fn global_error_handler(request: Request, next: Next) -> Response {
    let request_id = request.extensions().get::<RequestId>().map(|r| r.0.clone());
    let mut response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    if let Some(mut body) = response.extensions_mut().remove::<ErrorResponse>() {
        let Some(id) = request_id else {
            return response;
        };
        body.request_id = Some(id);
        let (parts, _) = response.into_parts();
        return render(status, parts.headers, body);
    }

    if is_json(response.headers()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let original = to_bytes(body, MAX_ERROR_BODY)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    let message = if original.is_empty() {
        fallback_message(status)
    } else {
        original
    };

    let mut body = ErrorResponse::new(fallback_code(status), message);
    if let Some(id) = request_id {
        body = body.with_request_id(id);
    }
    render(status, parts.headers, body)
}
