//! One-shot refresh-and-retry envelope for calendar calls
//!
//! Every operation that reaches the calendar service with a cached access
//! token goes through [`with_credential_refresh`]: a single detected
//! expired-grant failure triggers one upstream token refresh and exactly one
//! retry, and the retried outcome is final. All other failures propagate
//! untouched.

use std::future::Future;

use tracing::info;

use crate::client::{CalendarApi, CalendarError};
use crate::models::{Calendar, Credentials};

/// Case-insensitive substring identifying the franchise calendar among the
/// account's calendars
pub const TARGET_CALENDAR_MARKER: &str = "EPICU";

/// Run `operation` with the current access token, recovering once from an
/// expired grant
///
/// On [`CalendarError::ExpiredGrant`]: without a refresh token the call
/// fails with [`CalendarError::CredentialExpired`]; a failed refresh becomes
/// [`CalendarError::CredentialExpiredAndUnrefreshable`]; a successful
/// refresh updates `credentials` in place and the operation is retried
/// exactly once. Callers can compare the access token before and after to
/// know whether a rotated credential must be re-issued to the client.
pub async fn with_credential_refresh<T, F, Fut>(
    client: &dyn CalendarApi,
    credentials: &mut Credentials,
    operation: F,
) -> Result<T, CalendarError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, CalendarError>>,
{
    match operation(credentials.access_token.clone()).await {
        Ok(value) => Ok(value),
        Err(CalendarError::ExpiredGrant) => {
            let refresh_token = credentials
                .refresh_token
                .as_deref()
                .ok_or(CalendarError::CredentialExpired)?;

            info!("Calendar grant expired, refreshing credential");
            let new_access = client
                .refresh_credential(refresh_token)
                .await
                .map_err(|e| CalendarError::CredentialExpiredAndUnrefreshable(e.to_string()))?;

            credentials.access_token = new_access.clone();

            // The retried attempt's outcome is final; no second retry.
            operation(new_access).await
        }
        Err(other) => Err(other),
    }
}

/// Select the franchise calendar among the account's calendars
///
/// Picks the first calendar whose display name contains `marker`,
/// case-insensitively.
pub fn find_target_calendar<'a>(
    calendars: &'a [Calendar],
    marker: &str,
) -> Result<&'a Calendar, CalendarError> {
    let needle = marker.to_lowercase();
    calendars
        .iter()
        .find(|calendar| calendar.display_name.to_lowercase().contains(&needle))
        .ok_or_else(|| CalendarError::TargetCalendarNotFound(marker.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::models::{CalendarEvent, EventTime, EventWindow, NewEvent};

    /// Scripted calendar double: fails `insert_event` with the expired-grant
    /// marker a configured number of times, then succeeds. Counts calls.
    struct ScriptedCalendar {
        grant_failures: u32,
        refresh_succeeds: bool,
        insert_calls: AtomicU32,
        refresh_calls: AtomicU32,
    }

    impl ScriptedCalendar {
        fn new(grant_failures: u32, refresh_succeeds: bool) -> Arc<Self> {
            Arc::new(Self {
                grant_failures,
                refresh_succeeds,
                insert_calls: AtomicU32::new(0),
                refresh_calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl CalendarApi for ScriptedCalendar {
        async fn list_calendars(&self, _: &str) -> Result<Vec<Calendar>, CalendarError> {
            Ok(vec![
                Calendar {
                    id: "cal-a".to_string(),
                    display_name: "Team A".to_string(),
                },
                Calendar {
                    id: "cal-epicu".to_string(),
                    display_name: "EPICU Paris".to_string(),
                },
            ])
        }

        async fn list_events(
            &self,
            _: &str,
            _: &str,
            _: &EventWindow,
        ) -> Result<Vec<CalendarEvent>, CalendarError> {
            Ok(vec![])
        }

        async fn insert_event(
            &self,
            _: &str,
            _: &str,
            event: &NewEvent,
        ) -> Result<CalendarEvent, CalendarError> {
            let call = self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.grant_failures {
                return Err(CalendarError::ExpiredGrant);
            }
            Ok(CalendarEvent {
                id: "evt-1".to_string(),
                summary: Some(event.summary.clone()),
                description: event.description.clone(),
                location: event.location.clone(),
                start: Some(event.start.clone()),
                end: Some(event.end.clone()),
            })
        }

        async fn delete_event(&self, _: &str, _: &str, _: &str) -> Result<(), CalendarError> {
            Ok(())
        }

        async fn refresh_credential(&self, _: &str) -> Result<String, CalendarError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_succeeds {
                Ok("fresh-access".to_string())
            } else {
                Err(CalendarError::Upstream {
                    status: 400,
                    message: "invalid_grant".to_string(),
                })
            }
        }
    }

    fn sample_event() -> NewEvent {
        let now = chrono::Utc::now();
        NewEvent {
            summary: "Apéro mensuel".to_string(),
            description: None,
            location: None,
            start: EventTime::at(now),
            end: EventTime::at(now + chrono::Duration::hours(2)),
        }
    }

    fn credentials(refresh_token: Option<&str>) -> Credentials {
        Credentials {
            access_token: "stale-access".to_string(),
            refresh_token: refresh_token.map(str::to_string),
        }
    }

    async fn insert_through_wrapper(
        calendar: &Arc<ScriptedCalendar>,
        credentials: &mut Credentials,
    ) -> Result<CalendarEvent, CalendarError> {
        let client = calendar.clone();
        let event = sample_event();
        with_credential_refresh(calendar.as_ref(), credentials, |token| {
            let client = client.clone();
            let event = event.clone();
            async move { client.insert_event(&token, "cal-epicu", &event).await }
        })
        .await
    }

    #[tokio::test]
    async fn expired_grant_triggers_one_refresh_and_one_retry() {
        let calendar = ScriptedCalendar::new(1, true);
        let mut creds = credentials(Some("refresh-token"));

        let event = insert_through_wrapper(&calendar, &mut creds).await.unwrap();

        assert_eq!(event.summary.as_deref(), Some("Apéro mensuel"));
        assert_eq!(calendar.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(calendar.insert_calls.load(Ordering::SeqCst), 2);
        // The cached credential was rotated in place.
        assert_eq!(creds.access_token, "fresh-access");
    }

    #[tokio::test]
    async fn the_retried_outcome_is_final() {
        // Fails with the grant marker on both attempts: the second failure
        // must come back unchanged, with no further refresh or retry.
        let calendar = ScriptedCalendar::new(2, true);
        let mut creds = credentials(Some("refresh-token"));

        let result = insert_through_wrapper(&calendar, &mut creds).await;

        assert!(matches!(result, Err(CalendarError::ExpiredGrant)));
        assert_eq!(calendar.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(calendar.insert_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_grant_failures_are_not_retried() {
        let calendar = ScriptedCalendar::new(0, true);
        let mut creds = credentials(Some("refresh-token"));

        let result = with_credential_refresh(calendar.as_ref(), &mut creds, |_token| async {
            Err::<(), _>(CalendarError::Upstream {
                status: 404,
                message: "Not Found".to_string(),
            })
        })
        .await;

        assert!(matches!(
            result,
            Err(CalendarError::Upstream { status: 404, .. })
        ));
        assert_eq!(calendar.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_retry() {
        let calendar = ScriptedCalendar::new(1, true);
        let mut creds = credentials(None);

        let result = insert_through_wrapper(&calendar, &mut creds).await;

        assert!(matches!(result, Err(CalendarError::CredentialExpired)));
        assert_eq!(calendar.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(calendar.insert_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_is_reported_as_unrefreshable() {
        let calendar = ScriptedCalendar::new(1, false);
        let mut creds = credentials(Some("refresh-token"));

        let result = insert_through_wrapper(&calendar, &mut creds).await;

        assert!(matches!(
            result,
            Err(CalendarError::CredentialExpiredAndUnrefreshable(_))
        ));
        assert_eq!(calendar.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(calendar.insert_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn target_resolution_picks_the_marked_calendar() {
        let calendars = vec![
            Calendar {
                id: "cal-a".to_string(),
                display_name: "Team A".to_string(),
            },
            Calendar {
                id: "cal-epicu".to_string(),
                display_name: "EPICU Paris".to_string(),
            },
        ];

        let target = find_target_calendar(&calendars, TARGET_CALENDAR_MARKER).unwrap();
        assert_eq!(target.id, "cal-epicu");

        // Matching is case-insensitive on both sides.
        let target = find_target_calendar(&calendars, "epicu").unwrap();
        assert_eq!(target.id, "cal-epicu");
    }

    #[test]
    fn target_resolution_fails_when_nothing_matches() {
        let calendars = vec![Calendar {
            id: "cal-a".to_string(),
            display_name: "Team A".to_string(),
        }];

        let result = find_target_calendar(&calendars, TARGET_CALENDAR_MARKER);
        assert!(matches!(
            result,
            Err(CalendarError::TargetCalendarNotFound(_))
        ));
    }
}
