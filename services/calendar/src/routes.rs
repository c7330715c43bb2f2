//! Calendar integration routes
//!
//! Credentials ride on http-only cookies. Every handler resolves the
//! franchise calendar by its display-name marker inside the resilient
//! wrapper, so a retried attempt re-runs the resolution with the refreshed
//! credential. When the wrapper rotated the credential mid-call, the
//! response sets an updated access cookie.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::{
    AppState,
    client::{CalendarError, credentials_from_tokens},
    cookies,
    models::{Credentials, EventTime, EventWindow, NewEvent},
    resilient::{TARGET_CALENDAR_MARKER, find_target_calendar, with_credential_refresh},
};

/// Request for event creation
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Query bounding the synchronization window
#[derive(Deserialize)]
pub struct WindowQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Create the router for the calendar service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/calendar/status", get(calendar_status))
        .route("/calendar/events", get(sync_events).post(create_event))
        .route("/calendar/events/:id", delete(delete_event))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "calendar-service"
    }))
}

fn credentials_from_jar(jar: &CookieJar) -> Result<Credentials, CalendarError> {
    credentials_from_tokens(
        jar.get(cookies::ACCESS_COOKIE)
            .map(|c| c.value().to_string()),
        jar.get(cookies::REFRESH_COOKIE)
            .map(|c| c.value().to_string()),
    )
}

/// Re-issue the access cookie when the wrapper rotated the credential
fn with_rotated_cookie(
    jar: CookieJar,
    presented: &str,
    credentials: &Credentials,
    secure: bool,
) -> CookieJar {
    if credentials.access_token == presented {
        jar
    } else {
        jar.add(cookies::access_cookie(&credentials.access_token, secure))
    }
}

/// Connection status: resolves the franchise calendar on the account
pub async fn calendar_status(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, CalendarError> {
    let mut credentials = credentials_from_jar(&jar)?;
    let presented = credentials.access_token.clone();

    let client = state.client.clone();
    let target = with_credential_refresh(state.client.as_ref(), &mut credentials, |token| {
        let client = client.clone();
        async move {
            let calendars = client.list_calendars(&token).await?;
            find_target_calendar(&calendars, TARGET_CALENDAR_MARKER).cloned()
        }
    })
    .await?;

    let jar = with_rotated_cookie(jar, &presented, &credentials, state.cookie_secure);
    Ok((
        jar,
        Json(json!({
            "connected": true,
            "calendarId": target.id,
            "displayName": target.display_name,
        })),
    ))
}

/// Create an event in the franchise calendar
pub async fn create_event(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, CalendarError> {
    let mut credentials = credentials_from_jar(&jar)?;
    let presented = credentials.access_token.clone();

    let event = NewEvent {
        summary: payload.summary,
        description: payload.description,
        location: payload.location,
        start: EventTime::at(payload.start),
        end: EventTime::at(payload.end),
    };

    let client = state.client.clone();
    let created = with_credential_refresh(state.client.as_ref(), &mut credentials, |token| {
        let client = client.clone();
        let event = event.clone();
        async move {
            let calendars = client.list_calendars(&token).await?;
            let target = find_target_calendar(&calendars, TARGET_CALENDAR_MARKER)?;
            client.insert_event(&token, &target.id, &event).await
        }
    })
    .await?;

    info!("Created calendar event: {}", created.id);
    let jar = with_rotated_cookie(jar, &presented, &credentials, state.cookie_secure);
    Ok((StatusCode::CREATED, jar, Json(created)))
}

/// Delete an event from the franchise calendar
pub async fn delete_event(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, CalendarError> {
    let mut credentials = credentials_from_jar(&jar)?;
    let presented = credentials.access_token.clone();

    let client = state.client.clone();
    with_credential_refresh(state.client.as_ref(), &mut credentials, |token| {
        let client = client.clone();
        let event_id = event_id.clone();
        async move {
            let calendars = client.list_calendars(&token).await?;
            let target = find_target_calendar(&calendars, TARGET_CALENDAR_MARKER)?;
            client.delete_event(&token, &target.id, &event_id).await
        }
    })
    .await?;

    info!("Deleted calendar event: {}", event_id);
    let jar = with_rotated_cookie(jar, &presented, &credentials, state.cookie_secure);
    Ok((jar, Json(json!({"message": "Event deleted successfully"}))))
}

/// List the franchise calendar's events within a bounded window
pub async fn sync_events(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, CalendarError> {
    let mut credentials = credentials_from_jar(&jar)?;
    let presented = credentials.access_token.clone();

    let window = EventWindow {
        from: query.from,
        to: query.to,
    };

    let client = state.client.clone();
    let events = with_credential_refresh(state.client.as_ref(), &mut credentials, |token| {
        let client = client.clone();
        async move {
            let calendars = client.list_calendars(&token).await?;
            let target = find_target_calendar(&calendars, TARGET_CALENDAR_MARKER)?;
            client.list_events(&token, &target.id, &window).await
        }
    })
    .await?;

    let jar = with_rotated_cookie(jar, &presented, &credentials, state.cookie_secure);
    Ok((
        jar,
        Json(json!({
            "events": events,
            "count": events.len(),
        })),
    ))
}

impl IntoResponse for CalendarError {
    fn into_response(self) -> Response {
        let status = match &self {
            CalendarError::MissingCredential
            | CalendarError::ExpiredGrant
            | CalendarError::CredentialExpired
            | CalendarError::CredentialExpiredAndUnrefreshable(_) => StatusCode::UNAUTHORIZED,
            CalendarError::TargetCalendarNotFound(_) => StatusCode::NOT_FOUND,
            CalendarError::Request(_) | CalendarError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            CalendarError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Calendar operation failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
