use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::handlers::{diagnostics, health_check, ready_check};
use crate::routes::auth_middleware::auth_middleware;
use crate::ws::handler::websocket_handler;
use crate::AppState;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        )) // Applies to all routes added above
        .with_state(state)
}

/// Public routes: health probes and the WebSocket endpoint.
/// WebSocket authentication happens inside the handler, pre-upgrade.
pub fn create_public_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}
