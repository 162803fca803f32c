pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use db::SnapshotBackend;
use services::auth_service::JwtVerifier;
use services::snapshot_service::SnapshotService;
use ws::presence::PresenceTracker;
use ws::registry::ConnectionRegistry;
use ws::rooms::Rooms;
use ws::scheduler::SaveScheduler;

/// Shared application state.
///
/// Every component is constructed here and injected; none of them hold
/// process-global state, so tests can build as many independent
/// instances as they need.
pub struct AppState {
    pub config: Config,
    pub verifier: JwtVerifier,
    pub registry: ConnectionRegistry,
    pub rooms: Rooms,
    pub presence: PresenceTracker,
    pub snapshots: Arc<SnapshotService>,
    pub scheduler: SaveScheduler,
}

impl AppState {
    pub fn new(config: Config, backend: SnapshotBackend) -> Self {
        let verifier = JwtVerifier::new(config.auth_jwt_secret.clone());
        let snapshots = Arc::new(SnapshotService::new(
            backend,
            Duration::from_secs(config.snapshot_cache_ttl_secs),
        ));
        let scheduler = SaveScheduler::new(
            snapshots.clone(),
            Duration::from_millis(config.save_debounce_ms),
        );

        Self {
            config,
            verifier,
            registry: ConnectionRegistry::new(),
            rooms: Rooms::new(),
            presence: PresenceTracker::new(),
            snapshots,
            scheduler,
        }
    }
}

/// Build the full application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health probes and the WebSocket endpoint
        .merge(routes::api::create_public_routes(state.clone()))
        // Mount API routes
        .nest("/api", routes::api::create_api_routes(state))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
