//! Fixed-window request quotas per API client.

use super::TierLimits;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            count: 0,
        }
    }

    fn roll(&mut self, now: Instant, length: Duration) {
        if now.duration_since(self.started) >= length {
            self.started = now;
            self.count = 0;
        }
    }

    fn retry_after(&self, now: Instant, length: Duration) -> Duration {
        length.saturating_sub(now.duration_since(self.started))
    }
}

#[derive(Debug, Clone)]
struct ClientWindows {
    minute: Window,
    hour: Window,
    month: Window,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        remaining_minute: u32,
        remaining_month: u32,
    },
    Limited {
        /// Which window is exhausted: "minute", "hour" or "month".
        window: &'static str,
        retry_after: Duration,
    },
}

#[cfg(test)]
impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// In-memory limiter keyed by client id.
#[derive(Debug, Default)]
pub struct RateLimiter {
    clients: Mutex<HashMap<String, ClientWindows>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one request for `client_id`.
    pub async fn check(&self, client_id: &str, limits: TierLimits) -> RateLimitDecision {
        self.check_at(client_id, limits, Instant::now()).await
    }

    /// Same as [`check`](Self::check) with an explicit clock.
    ///
    /// A request is admitted only if every window has room; rejected
    /// requests do not consume quota.
    pub async fn check_at(
        &self,
        client_id: &str,
        limits: TierLimits,
        now: Instant,
    ) -> RateLimitDecision {
        let mut clients = self.clients.lock().await;
        let windows = clients
            .entry(client_id.to_string())
            .or_insert_with(|| ClientWindows {
                minute: Window::new(now),
                hour: Window::new(now),
                month: Window::new(now),
            });

        windows.minute.roll(now, MINUTE);
        windows.hour.roll(now, HOUR);
        windows.month.roll(now, MONTH);

        let checks = [
            ("month", &windows.month, limits.per_month, MONTH),
            ("hour", &windows.hour, limits.per_hour, HOUR),
            ("minute", &windows.minute, limits.per_minute, MINUTE),
        ];
        for (name, window, limit, length) in checks {
            if window.count >= limit {
                return RateLimitDecision::Limited {
                    window: name,
                    retry_after: window.retry_after(now, length),
                };
            }
        }

        windows.minute.count += 1;
        windows.hour.count += 1;
        windows.month.count += 1;

        RateLimitDecision::Allowed {
            remaining_minute: limits.per_minute - windows.minute.count,
            remaining_month: limits.per_month - windows.month.count,
        }
    }
}
