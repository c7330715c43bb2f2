//! HTTP client for the upstream calendar service
//!
//! Targets the Google Calendar v3 API with manual OAuth token refresh. The
//! one failure class the rest of the service cares about, an expired or
//! revoked grant, is surfaced as the distinguished
//! [`CalendarError::ExpiredGrant`] so the resilient wrapper can recover it.

use async_trait::async_trait;
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Calendar, CalendarEvent, Credentials, EventWindow, NewEvent};

/// Closed failure set for calendar operations
#[derive(Error, Debug)]
pub enum CalendarError {
    /// No credential cookie accompanied the request
    #[error("Calendar credential is missing")]
    MissingCredential,

    /// The upstream service signaled an invalid or expired grant
    #[error("Calendar credential expired")]
    ExpiredGrant,

    /// The grant expired and there is no refresh token to recover with
    #[error("Calendar credential expired and no refresh token is available")]
    CredentialExpired,

    /// The grant expired and the refresh attempt failed too
    #[error("Calendar credential expired and could not be refreshed: {0}")]
    CredentialExpiredAndUnrefreshable(String),

    /// No calendar on the account matches the configured marker
    #[error("No calendar matching \"{0}\" found for this account")]
    TargetCalendarNotFound(String),

    /// Transport-level failure reaching the calendar service
    #[error("Calendar request error: {0}")]
    Request(#[source] reqwest::Error),

    /// Any other upstream rejection
    #[error("Calendar service returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Configuration error
    #[error("Calendar configuration error: {0}")]
    Configuration(String),
}

/// Contract for the upstream calendar service
///
/// Any call may fail with [`CalendarError::ExpiredGrant`], distinguishable
/// from every other failure.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// List all calendars belonging to the account
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<Calendar>, CalendarError>;

    /// List events of one calendar within a bounded time window
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &EventWindow,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// Create an event
    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewEvent,
    ) -> Result<CalendarEvent, CalendarError>;

    /// Delete an event
    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError>;

    /// Exchange a refresh token for a new access token
    async fn refresh_credential(&self, refresh_token: &str) -> Result<String, CalendarError>;
}

/// Configuration for the calendar integration
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Base URL of the calendar API
    pub api_url: String,
    /// OAuth token endpoint used for manual refresh
    pub token_url: String,
    /// OAuth client id of this application
    pub client_id: String,
    /// OAuth client secret of this application
    pub client_secret: String,
    /// Whether credential cookies carry the Secure attribute
    pub cookie_secure: bool,
}

impl CalendarConfig {
    /// Create a new CalendarConfig from environment variables
    ///
    /// # Environment Variables
    /// - `CALENDAR_API_URL`: Calendar API base (default: "https://www.googleapis.com/calendar/v3")
    /// - `CALENDAR_TOKEN_URL`: OAuth token endpoint (default: "https://oauth2.googleapis.com/token")
    /// - `CALENDAR_CLIENT_ID`: OAuth client id (required)
    /// - `CALENDAR_CLIENT_SECRET`: OAuth client secret (required)
    /// - `APP_ENV`: cookies are marked Secure when set to "production"
    pub fn from_env() -> Result<Self, CalendarError> {
        let api_url = env::var("CALENDAR_API_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/calendar/v3".to_string());
        let token_url = env::var("CALENDAR_TOKEN_URL")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string());

        let client_id = env::var("CALENDAR_CLIENT_ID").map_err(|_| {
            CalendarError::Configuration("CALENDAR_CLIENT_ID environment variable not set".into())
        })?;
        let client_secret = env::var("CALENDAR_CLIENT_SECRET").map_err(|_| {
            CalendarError::Configuration(
                "CALENDAR_CLIENT_SECRET environment variable not set".into(),
            )
        })?;

        let cookie_secure = env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token_url,
            client_id,
            client_secret,
            cookie_secure,
        })
    }
}

#[derive(serde::Deserialize)]
struct CalendarList {
    #[serde(default)]
    items: Vec<Calendar>,
}

#[derive(serde::Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[derive(serde::Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
}

/// Google Calendar client
#[derive(Clone)]
pub struct GoogleCalendarClient {
    client: reqwest::Client,
    config: CalendarConfig,
}

impl GoogleCalendarClient {
    /// Initialize a new calendar client
    pub fn new(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CalendarError::Request)?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Pass a successful response through, mapping failures onto the error
    /// taxonomy; 401s and invalid-grant bodies become [`CalendarError::ExpiredGrant`]
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let message = response.text().await.unwrap_or_default();
        if is_invalid_grant(code, &message) {
            return Err(CalendarError::ExpiredGrant);
        }

        Err(CalendarError::Upstream {
            status: code,
            message,
        })
    }
}

/// Whether an upstream rejection is the invalid-grant marker
pub fn is_invalid_grant(status: u16, message: &str) -> bool {
    status == 401 || message.contains("invalid_grant") || message.contains("Invalid Credentials")
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<Calendar>, CalendarError> {
        let response = self
            .client
            .get(format!("{}/users/me/calendarList", self.config.api_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(CalendarError::Request)?;

        let response = Self::check(response).await?;
        let list: CalendarList = response.json().await.map_err(CalendarError::Request)?;
        Ok(list.items)
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &EventWindow,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let response = self
            .client
            .get(format!(
                "{}/calendars/{}/events",
                self.config.api_url, calendar_id
            ))
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", window.from.to_rfc3339()),
                ("timeMax", window.to.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await
            .map_err(CalendarError::Request)?;

        let response = Self::check(response).await?;
        let list: EventList = response.json().await.map_err(CalendarError::Request)?;
        Ok(list.items)
    }

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewEvent,
    ) -> Result<CalendarEvent, CalendarError> {
        let response = self
            .client
            .post(format!(
                "{}/calendars/{}/events",
                self.config.api_url, calendar_id
            ))
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(CalendarError::Request)?;

        let response = Self::check(response).await?;
        response.json().await.map_err(CalendarError::Request)
    }

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError> {
        let response = self
            .client
            .delete(format!(
                "{}/calendars/{}/events/{}",
                self.config.api_url, calendar_id, event_id
            ))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(CalendarError::Request)?;

        Self::check(response).await?;
        Ok(())
    }

    async fn refresh_credential(&self, refresh_token: &str) -> Result<String, CalendarError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(CalendarError::Request)?;

        let response = Self::check(response).await?;
        let body: TokenRefreshResponse = response.json().await.map_err(CalendarError::Request)?;
        Ok(body.access_token)
    }
}

/// Build credentials from raw token values, requiring at least the access token
pub fn credentials_from_tokens(
    access_token: Option<String>,
    refresh_token: Option<String>,
) -> Result<Credentials, CalendarError> {
    let access_token = access_token.ok_or(CalendarError::MissingCredential)?;
    Ok(Credentials {
        access_token,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_status_is_the_grant_marker() {
        assert!(is_invalid_grant(401, ""));
    }

    #[test]
    fn invalid_grant_body_is_the_grant_marker() {
        assert!(is_invalid_grant(400, r#"{"error": "invalid_grant"}"#));
        assert!(is_invalid_grant(403, "Invalid Credentials"));
    }

    #[test]
    fn other_failures_are_not_the_grant_marker() {
        assert!(!is_invalid_grant(404, "Not Found"));
        assert!(!is_invalid_grant(400, "missing parameter: start"));
        assert!(!is_invalid_grant(500, "backend error"));
    }

    #[test]
    fn missing_access_token_is_rejected() {
        let result = credentials_from_tokens(None, Some("refresh".to_string()));
        assert!(matches!(result, Err(CalendarError::MissingCredential)));
    }
}
