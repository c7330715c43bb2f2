//! Cookie helpers for the calendar credential transport
//!
//! The calendar integration carries its OAuth tokens as http-only cookies;
//! the session endpoints use the Authorization header instead.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the calendar access token
pub const ACCESS_COOKIE: &str = "calendar_access_token";
/// Cookie name for the calendar refresh token
pub const REFRESH_COOKIE: &str = "calendar_refresh_token";

/// Access-token cookie lifetime: one hour
const ACCESS_MAX_AGE_SECS: i64 = 3_600;
/// Refresh-token cookie lifetime: 30 days
const REFRESH_MAX_AGE_SECS: i64 = 2_592_000;

/// Build the http-only cookie carrying the access token
pub fn access_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(ACCESS_MAX_AGE_SECS))
        .build()
}

/// Build the http-only cookie carrying the refresh token
pub fn refresh_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(REFRESH_MAX_AGE_SECS))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_cookie_carries_the_required_attributes() {
        let cookie = access_cookie("token-value", true);
        assert_eq!(cookie.name(), ACCESS_COOKIE);
        assert_eq!(cookie.value(), "token-value");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(3_600)));
    }

    #[test]
    fn refresh_cookie_lives_thirty_days() {
        let cookie = refresh_cookie("token-value", false);
        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(2_592_000)));
    }
}
