//! API service routes

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use crate::{error::ApiError, middleware::auth_middleware, state::AppState};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users", get(get_users))
        .route("/users/:id", get(get_user))
        .route("/cities", get(get_cities))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// Get all users
pub async fn get_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = state.user_repository.get_all().await.map_err(|e| {
        tracing::error!("Failed to get users: {}", e);
        ApiError::InternalServerError
    })?;

    Ok(Json(users))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .user_repository
        .find_by_id(&id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get user: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or(ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Get all cities
pub async fn get_cities(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cities = state.city_repository.get_all().await.map_err(|e| {
        tracing::error!("Failed to get cities: {}", e);
        ApiError::InternalServerError
    })?;

    Ok(Json(cities))
}
