//! Session service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::{
    AppState,
    middleware::{CurrentUser, auth_middleware},
    models::{CitySummary, UserSummary},
    session::SessionError,
    validation,
};

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for user login
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub user: UserSummary,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at_access: DateTime<Utc>,
    pub expires_at_refresh: DateTime<Utc>,
}

/// Request for token refresh
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub access_token: Option<String>,
}

/// Response for token refresh
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at_access: DateTime<Utc>,
    pub expires_at_refresh: DateTime<Utc>,
}

/// Request for logout
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Query carrying a one-time token
#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

/// Request for setting a password with a one-time token
#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Response for signup-token validation
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupTokenResponse {
    pub message: String,
    pub user_name: String,
    pub user_id: String,
}

/// Response for inline config-token validation
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineTokenResponse {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub cities: Vec<CitySummary>,
}

/// Create the router for the session service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .route("/auth/signup-token", get(validate_signup_token))
        .route("/auth/password", post(initialize_password))
        .route("/auth/config-token", get(validate_config_token))
        .route(
            "/auth/config-token/password",
            post(set_password_by_config_token),
        )
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "session-service"
    }))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, SessionError> {
    info!("Login attempt for user: {}", payload.email);

    validation::validate_email(&payload.email).map_err(SessionError::Validation)?;

    if !state.login_throttle.is_allowed(&payload.email).await {
        return Err(SessionError::RateLimited);
    }

    let outcome = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;

    let response = LoginResponse {
        message: "Login successful".to_string(),
        user: UserSummary::from(&outcome.user),
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        expires_at_access: outcome.tokens.access_expires_at,
        expires_at_refresh: outcome.tokens.refresh_expires_at,
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Refresh token endpoint
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, SessionError> {
    info!("Token refresh request");

    let pair = state
        .sessions
        .refresh(&payload.refresh_token, payload.access_token.as_deref())
        .await?;

    let response = RefreshResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_at_access: pair.access_expires_at,
        expires_at_refresh: pair.refresh_expires_at,
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<impl IntoResponse, SessionError> {
    info!("Logout request");

    state
        .sessions
        .logout(
            payload.access_token.as_deref(),
            payload.refresh_token.as_deref(),
        )
        .await?;

    Ok(Json(json!({"message": "Logged out successfully"})))
}

/// Signup-token validation endpoint (side-effect-free)
pub async fn validate_signup_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, SessionError> {
    let info = state.sessions.validate_signup_token(&query.token).await?;

    let response = SignupTokenResponse {
        message: "Token is valid".to_string(),
        user_name: info.user_name,
        user_id: info.user_id,
    };

    Ok(Json(response))
}

/// First-time password initialization endpoint
pub async fn initialize_password(
    State(state): State<AppState>,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<impl IntoResponse, SessionError> {
    validation::validate_password(&payload.password).map_err(SessionError::Validation)?;

    state
        .sessions
        .initialize_password(&payload.token, &payload.password)
        .await?;

    Ok(Json(json!({"message": "Password set successfully"})))
}

/// Inline config-token validation endpoint
pub async fn validate_config_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, SessionError> {
    let info = state.sessions.validate_inline_token(&query.token).await?;

    let response = InlineTokenResponse {
        user_id: info.user_id,
        first_name: info.first_name,
        last_name: info.last_name,
        cities: info.cities,
    };

    Ok(Json(response))
}

/// Password set via the inline config token
pub async fn set_password_by_config_token(
    State(state): State<AppState>,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<impl IntoResponse, SessionError> {
    validation::validate_password(&payload.password).map_err(SessionError::Validation)?;

    let user_id = state
        .sessions
        .set_password_by_inline_token(&payload.token, &payload.password)
        .await?;

    Ok(Json(json!({"userId": user_id})))
}

/// Current-user endpoint behind the bearer middleware
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, SessionError> {
    let user = state.sessions.current_user(&current.id).await?;
    Ok(Json(json!({"user": UserSummary::from(&user)})))
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::InvalidCredentials
            | SessionError::InvalidRefreshToken
            | SessionError::ExpiredRefreshToken => StatusCode::UNAUTHORIZED,
            SessionError::MissingTokens | SessionError::Validation(_) => StatusCode::BAD_REQUEST,
            SessionError::TokenNotFound
            | SessionError::TokenExpired
            | SessionError::UserNotFound
            | SessionError::InvalidToken => StatusCode::NOT_FOUND,
            SessionError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            SessionError::Store(_) | SessionError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Session operation failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
