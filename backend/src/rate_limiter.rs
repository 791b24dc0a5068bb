use std::collections::HashMap;
use std::sync::Mutex;
use time::{OffsetDateTime, Duration};
use tracing::{warn, error};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: OffsetDateTime,
    attempts: u32,
}

/// Fixed-window attempt counter keyed by caller.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    max_attempts: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window_minutes: i64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_attempts,
            window: Duration::minutes(window_minutes),
        }
    }

    /// Counts one attempt for `key`, failing with a retry hint once the key
    /// has used up its window.
    pub fn check(&self, key: &str) -> Result<(), String> {
        self.check_at(key, OffsetDateTime::now_utc())
    }

    pub(crate) fn check_at(&self, key: &str, now: OffsetDateTime) -> Result<(), String> {
        let mut windows = self.windows.lock().map_err(|e| {
            error!("Failed to acquire rate limit lock: {}", e);
            "Internal rate limit error".to_string()
        })?;

        windows.retain(|_, w| now - w.started <= self.window);

        let entry = windows
            .entry(key.to_string())
            .or_insert(Window { started: now, attempts: 0 });

        if entry.attempts >= self.max_attempts {
            let minutes_to_wait = (entry.started + self.window - now).whole_minutes().max(1);
            warn!("Rate limit triggered for key {}", key);
            return Err(format!("Rate limit exceeded. Please try again in {} minutes.", minutes_to_wait));
        }

        entry.attempts += 1;
        Ok(())
    }
}
