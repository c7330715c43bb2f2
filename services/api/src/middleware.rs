//! Authentication middleware for bearer-token validation
//!
//! The token is re-checked against the record store on every request; no
//! validity is cached locally.

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::error;

use crate::{error::ApiError, state::AppState};

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // Extract the Authorization header
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    // Check if it's a Bearer token
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let stored = state
        .session_repository
        .find_access_token(token)
        .await
        .map_err(|e| {
            error!("Failed to look up access token: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or(ApiError::Unauthorized)?;

    if Utc::now() > stored.expires_at {
        return Err(ApiError::Unauthorized);
    }

    // Insert the user into the request extensions
    req.extensions_mut().insert(AuthUser {
        id: stored.user_id,
    });

    // Call the next service
    let response = next.run(req).await;

    Ok(response)
}
