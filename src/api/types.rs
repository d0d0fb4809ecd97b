//! Shared handler plumbing: envelopes and header extraction.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::error::{FailureEnvelope, ServiceError};

pub type ApiFailure = (StatusCode, Json<FailureEnvelope>);

/// Flatten a typed error into the uniform envelope.
pub fn fail(err: ServiceError) -> ApiFailure {
    (err.http_status(), Json(FailureEnvelope::from(&err)))
}

/// The authenticated caller, forwarded by the gateway.
pub fn user_id(headers: &HeaderMap) -> Result<String, ApiFailure> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| fail(ServiceError::Validation("x-user-id header is required".into())))
}

/// Pull `filename="..."` out of a content-disposition header value.
pub fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
