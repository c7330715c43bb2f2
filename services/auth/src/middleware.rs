//! Middleware for bearer-token validation against the record store

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::error;

use crate::AppState;

/// Identifier of the authenticated user, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

/// Extract and validate a bearer access token from the Authorization header
///
/// Token validity is never cached: every request re-queries the token row
/// and compares its stored expiry to now.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // Extract the Authorization header
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let stored = state
        .tokens
        .find_access_token(token)
        .await
        .map_err(|e| {
            error!("Failed to look up access token: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if stored.is_expired(Utc::now()) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(CurrentUser {
        id: stored.user_id,
    });

    // Continue with the request
    Ok(next.run(req).await)
}
