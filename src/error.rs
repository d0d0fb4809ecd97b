//! Service error taxonomy.
//!
//! Internal code raises typed errors; the HTTP layer flattens every one of
//! them into the uniform `{success: false, message, status}` envelope so
//! callers branch on `success` rather than on transport details.

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy shared by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad or missing input
    #[error("{0}")]
    Validation(String),

    /// Stale sync token; nothing was mutated
    #[error("{0}")]
    Conflict(String),

    /// Operation invalid for the entity's current state
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    NotFound(String),

    /// Certificate criteria not satisfied
    #[error("{0}")]
    Ineligible(String),

    /// Renderer / object-store / event-bus / store failure
    #[error("{0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl ServiceError {
    /// Stable status code carried in the result envelope.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Rejected(_) => "REJECTED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Ineligible(_) => "INELIGIBLE",
            Self::Upstream(_) => "UPSTREAM_FAILURE",
        }
    }

    /// HTTP status the envelope rides on.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Ineligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Upstream(err.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Uniform failure envelope returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct FailureEnvelope {
    pub success: bool,
    pub message: String,
    pub status: &'static str,
}

impl From<&ServiceError> for FailureEnvelope {
    fn from(err: &ServiceError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            status: err.status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_status_code() {
        let err = ServiceError::Conflict("stale sync token".into());
        let envelope = FailureEnvelope::from(&err);
        assert!(!envelope.success);
        assert_eq!(envelope.status, "CONFLICT");
        assert_eq!(envelope.message, "stale sync token");
    }

    #[test]
    fn upstream_wraps_anyhow_with_context() {
        let err: ServiceError = anyhow::anyhow!("connect refused")
            .context("renderer dispatch failed")
            .into();
        assert_eq!(err.status_code(), "UPSTREAM_FAILURE");
        assert!(err.to_string().contains("renderer dispatch failed"));
    }
}
