//! Certificate endpoints: renderer webhook, reissue, public verification.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::certificate::{IssuanceOutcome, RenderCallback, VerifyError};
use crate::error::{FailureEnvelope, ServiceError};
use crate::renderer::{DISPOSITION_HEADER, TRACE_HEADER};

use super::routes::AppState;
use super::types::{disposition_filename, fail, user_id, ApiFailure};

/// POST /api/v1/certificates/callback - inbound renderer webhook.
///
/// Success deliveries carry the artifact as the body with a
/// content-disposition header; failures carry a JSON `{message}` body.
/// Either way the only correlation handle is the trace header, and an
/// unknown trace is answered with success so the renderer stops retrying.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let transaction_id = headers
        .get(TRACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            fail(ServiceError::Validation(format!(
                "{} header is required",
                TRACE_HEADER
            )))
        })?;

    let is_error_body = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    let callback = if is_error_body {
        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| "renderer reported an error".to_string());
        RenderCallback::Failure { message }
    } else {
        let filename = headers
            .get(DISPOSITION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename);
        RenderCallback::Success {
            filename,
            artifact: body,
        }
    };

    let disposition = state
        .issuer
        .handle_callback(transaction_id, callback)
        .await
        .map_err(fail)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "applied": disposition == crate::certificate::CallbackDisposition::Applied,
    })))
}

/// POST /api/v1/projects/:id/certificate/reissue - synchronous reissue.
pub async fn reissue(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let user_id = user_id(&headers)?;

    match state
        .issuer
        .reissue(&project_id, &user_id)
        .await
        .map_err(fail)?
    {
        IssuanceOutcome::Requested { transaction_id } => Ok(Json(serde_json::json!({
            "success": true,
            "transactionId": transaction_id,
        }))),
        IssuanceOutcome::Failed { message } => Err((
            StatusCode::BAD_GATEWAY,
            Json(FailureEnvelope {
                success: false,
                message,
                status: "UPSTREAM_FAILURE",
            }),
        )),
        // `reissue` never reports ineligibility as an outcome.
        IssuanceOutcome::Ineligible { message } => {
            Err(fail(ServiceError::Ineligible(message)))
        }
    }
}

/// GET /api/v1/projects/:id/certificate - public verification.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let record = state
        .verifier
        .verify(&project_id)
        .await
        .map_err(verify_failure)?;

    let mut body = serde_json::to_value(&record)
        .map_err(|e| fail(ServiceError::Upstream(e.into())))?;
    if let Some(map) = body.as_object_mut() {
        map.insert("success".into(), serde_json::Value::Bool(true));
    }
    Ok(Json(body))
}

fn verify_failure(err: VerifyError) -> ApiFailure {
    let status = match &err {
        VerifyError::ProjectNotFound => StatusCode::NOT_FOUND,
        VerifyError::NotEligible | VerifyError::CertificateNotAvailable(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        VerifyError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    let envelope = FailureEnvelope {
        success: false,
        message: err.to_string(),
        status: err.status_code(),
    };
    (status, Json(envelope))
}
