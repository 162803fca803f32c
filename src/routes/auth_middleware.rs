use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::services::auth_service::{self, AuthError};
use crate::AppState;

/// REST-side authentication.
///
/// Validates the bearer token and attaches the verified identity to the
/// request extensions for downstream handlers. Authorization decisions
/// (such as the admin gate on diagnostics) stay with the handlers.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = auth_service::extract_token(None, req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let identity = match state.verifier.verify(&token) {
        Ok(identity) => identity,
        Err(AuthError::SecretNotConfigured) => {
            error!("JWT secret not configured");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(e) => {
            error!("JWT validation failed: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
