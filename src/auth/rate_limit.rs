//! Rate limiting for sign-in endpoints
//!
//! Fixed window counter per client address, applied to `/auth/callback` and
//! `/auth/refresh`. Windows are judged on the shared `Clock`, so expiry in
//! tests follows `ManualClock` like every other lifetime in the service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::AppError;

/// Distinct clients remembered at once; live windows past this are
/// dropped oldest first
const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: DateTime<Utc>,
    hits: u32,
}

impl Window {
    fn is_open(&self, now: DateTime<Utc>, length: Duration) -> bool {
        self.opened_at
            .checked_add_signed(length)
            .is_none_or(|closes_at| now < closes_at)
    }
}

/// Per-client request counter
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    max_requests: u32,
    length: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Allow `max_requests` per `window_seconds` for each client
    ///
    /// A `max_requests` of 0 disables limiting.
    pub fn new(max_requests: u32, window_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        let length = i64::try_from(window_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            length,
            clock,
        }
    }

    /// Count one request from `client`
    ///
    /// # Errors
    /// `RateLimited` once the client has used up its window
    pub async fn admit(&self, client: &str) -> Result<(), AppError> {
        if self.max_requests == 0 {
            return Ok(());
        }

        let now = self.clock.now();
        let mut windows = self.windows.lock().await;

        if !windows.contains_key(client) && windows.len() >= MAX_TRACKED_CLIENTS {
            self.make_room(&mut windows, now);
        }

        match windows.get_mut(client) {
            Some(window) if window.is_open(now, self.length) => {
                if window.hits >= self.max_requests {
                    tracing::warn!(client = %client, "Auth rate limit exceeded");
                    return Err(AppError::RateLimited);
                }
                window.hits += 1;
            }
            _ => {
                windows.insert(
                    client.to_owned(),
                    Window {
                        opened_at: now,
                        hits: 1,
                    },
                );
            }
        }
        Ok(())
    }

    /// Requests counted for `client` in its open window
    pub async fn hits(&self, client: &str) -> u32 {
        let now = self.clock.now();
        self.windows
            .lock()
            .await
            .get(client)
            .filter(|window| window.is_open(now, self.length))
            .map_or(0, |window| window.hits)
    }

    /// Forget clients whose window has closed
    ///
    /// Returns the number of clients dropped.
    pub async fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| window.is_open(now, self.length));
        before - windows.len()
    }

    /// Clients currently remembered
    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }

    fn make_room(&self, windows: &mut HashMap<String, Window>, now: DateTime<Utc>) {
        windows.retain(|_, window| window.is_open(now, self.length));
        while windows.len() >= MAX_TRACKED_CLIENTS {
            let Some(oldest) = windows
                .iter()
                .min_by_key(|(_, window)| window.opened_at)
                .map(|(client, _)| client.clone())
            else {
                break;
            };
            windows.remove(&oldest);
        }
    }
}
