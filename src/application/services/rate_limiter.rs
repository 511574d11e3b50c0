use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Longest accepted window. Larger values are clamped to it.
pub const MAX_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_admissions: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_admissions: 2,
            window: Duration::from_secs(5),
        }
    }
}

/// Sliding-window admission log shared by every dispatch task in the process.
///
/// Callers queue on a fair mutex, so admissions are granted in the order
/// `acquire` was called. A caller that finds the window full sleeps until the
/// oldest admission ages out, while still holding its place in line.
pub struct RateLimiter {
    config: RateLimitConfig,
    admissions: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            max_admissions: config.max_admissions.max(1),
            window: config.window.min(MAX_WINDOW),
        };
        Self {
            config,
            admissions: Mutex::new(VecDeque::with_capacity(config.max_admissions as usize)),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Waits for a free slot in the window and consumes it.
    pub async fn acquire(&self) -> Instant {
        let mut admissions = self.admissions.lock().await;
        loop {
            let now = Instant::now();
            self.evict_expired(&mut admissions, now);

            if admissions.len() < self.config.max_admissions as usize {
                admissions.push_back(now);
                return now;
            }

            let reopens_at = admissions
                .front()
                .and_then(|oldest| oldest.checked_add(self.config.window))
                .unwrap_or(now + MAX_WINDOW);
            tracing::debug!(
                wait_ms = reopens_at.saturating_duration_since(now).as_millis() as u64,
                "rate limit window full, holding task"
            );
            sleep_until(reopens_at).await;
        }
    }

    fn evict_expired(&self, admissions: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = admissions.front() {
            if now.saturating_duration_since(*oldest) >= self.config.window {
                admissions.pop_front();
            } else {
                break;
            }
        }
    }
}
