//! Login throttle for preventing brute force attacks

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

/// Login throttle configuration
#[derive(Debug, Clone)]
pub struct LoginThrottleConfig {
    /// Maximum number of attempts allowed per account
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for LoginThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,        // 5 minutes
            ban_duration_seconds: 3600, // 1 hour
        }
    }
}

/// Per-account attempt tracking
#[derive(Debug)]
struct ThrottleEntry {
    attempts: u32,
    last_attempt: Instant,
    ban_expires: Option<Instant>,
}

/// Login throttle keyed by account email
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    config: LoginThrottleConfig,
    entries: Arc<Mutex<HashMap<String, ThrottleEntry>>>,
}

impl LoginThrottle {
    /// Create a new login throttle
    pub fn new(config: LoginThrottleConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check whether another login attempt for this account is allowed
    pub async fn is_allowed(&self, email: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let entry = entries.entry(email.to_string()).or_insert(ThrottleEntry {
            attempts: 0,
            last_attempt: now,
            ban_expires: None,
        });

        // Check if ban has expired
        if let Some(ban_expires) = entry.ban_expires {
            if now >= ban_expires {
                entry.attempts = 0;
                entry.ban_expires = None;
            } else {
                return false;
            }
        }

        // Check if window has expired
        if now.duration_since(entry.last_attempt) >= Duration::from_secs(self.config.window_seconds)
        {
            entry.attempts = 0;
        }

        // Check if we're over the limit
        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            info!(
                "Throttling login attempts for {} for {} seconds",
                email, self.config.ban_duration_seconds
            );
            return false;
        }

        entry.attempts += 1;
        entry.last_attempt = now;

        true
    }

    /// Get the throttle configuration
    pub fn config(&self) -> &LoginThrottleConfig {
        &self.config
    }
}
