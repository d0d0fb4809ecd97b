//! Project sync endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::sync::SyncRequest;

use super::routes::AppState;
use super::types::{fail, user_id, ApiFailure};

/// POST /api/v1/projects/:id/sync - reconcile a client-edited project.
pub async fn sync(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SyncRequest>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let user_id = user_id(&headers)?;

    let outcome = state
        .coordinator
        .sync(&project_id, &user_id, request)
        .await
        .map_err(fail)?;

    // Submission kicks off issuance out of band; the sync response does
    // not wait for the renderer.
    if outcome.newly_submitted {
        let issuer = Arc::clone(&state.issuer);
        let project_id = project_id.clone();
        tokio::spawn(async move {
            match issuer.issue(&project_id).await {
                Ok(outcome) => {
                    tracing::info!(%project_id, "certificate issuance finished: {:?}", outcome)
                }
                Err(e) => tracing::warn!(%project_id, "certificate issuance failed: {}", e),
            }
        });
    }

    let mut body = serde_json::to_value(&outcome.summary)
        .map_err(|e| fail(crate::error::ServiceError::Upstream(e.into())))?;
    if let Some(map) = body.as_object_mut() {
        map.insert("success".into(), serde_json::Value::Bool(true));
    }
    Ok(Json(body))
}
