//! Router and shared application state.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::certificate::{CertificateIssuer, CertificateVerifier, HttpEligibilityEvaluator};
use crate::config::Config;
use crate::events::{EventPublisher, HttpEventPublisher, NoopEventPublisher};
use crate::objectstore::{HttpObjectStore, ObjectStore};
use crate::renderer::GotenbergClient;
use crate::store::{HttpProjectStore, ProjectStore};
use crate::sync::ProjectSyncCoordinator;

use super::certificates;
use super::projects;

/// Shared application state: configuration plus the services every handler
/// dispatches into. Collaborators are constructed once at startup and
/// injected; nothing is looked up from ambient globals.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProjectStore>,
    pub coordinator: ProjectSyncCoordinator,
    pub issuer: Arc<CertificateIssuer>,
    pub verifier: CertificateVerifier,
}

impl AppState {
    /// Wire up every collaborator from configuration.
    pub fn from_config(config: Config) -> Self {
        let store: Arc<dyn ProjectStore> = Arc::new(HttpProjectStore::new(
            &config.store_url,
            &config.store_api_key,
        ));
        let objects: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(
            &config.object_store_url,
            &config.object_store_key,
            &config.object_store_bucket,
        ));
        let events: Arc<dyn EventPublisher> = match &config.event_endpoint {
            Some(endpoint) => Arc::new(HttpEventPublisher::new(endpoint)),
            None => Arc::new(NoopEventPublisher),
        };
        let renderer = Arc::new(GotenbergClient::new(
            &config.renderer_url,
            &config.renderer_callback_url,
            config.renderer_timeout_secs,
        ));
        let evaluator = Arc::new(HttpEligibilityEvaluator::new(
            &config.eligibility_url,
            &config.eligibility_api_key,
        ));

        let coordinator =
            ProjectSyncCoordinator::new(Arc::clone(&store), Arc::clone(&events));
        let issuer = Arc::new(CertificateIssuer::new(
            Arc::clone(&store),
            evaluator,
            renderer,
            Arc::clone(&objects),
            Arc::clone(&events),
            config.verification_base_url.clone(),
        ));
        let verifier =
            CertificateVerifier::new(Arc::clone(&store), objects, config.read_url_ttl_secs);

        Self {
            config,
            store,
            coordinator,
            issuer,
            verifier,
        }
    }
}

/// Build the router over a prepared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/v1/projects/:id/sync", post(projects::sync))
        .route(
            "/api/v1/projects/:id/certificate/reissue",
            post(certificates::reissue),
        )
        // Public: verification and the renderer webhook carry no user.
        .route("/api/v1/projects/:id/certificate", get(certificates::verify))
        .route("/api/v1/certificates/callback", post(certificates::callback))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::from_config(config));

    // Explicit, idempotent index registration, decoupled from store
    // construction.
    state.store.ensure_indexes().await?;

    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
