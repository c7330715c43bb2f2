//! Calendar integration models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth credential pair for the connected calendar account
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// A calendar visible to the connected account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    #[serde(rename = "summary")]
    pub display_name: String,
}

/// Start or end marker of an event; either a timestamp or an all-day date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EventTime {
    /// A timed event marker
    pub fn at(moment: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(moment),
            date: None,
        }
    }
}

/// An event as returned by the calendar service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
}

/// Payload for creating an event
#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

/// Bounded time window for event synchronization
#[derive(Debug, Clone, Copy)]
pub struct EventWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}
