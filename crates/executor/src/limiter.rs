//! Global job-rate limiter protecting downstream venues.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Fixed-window rate limiter: at most `max` acquisitions per `window`.
///
/// `acquire` waits for the next window when the current one is spent, so
/// callers simply await it before starting a job. Shared across the whole
/// worker pool - the limit is global, not per worker.
pub struct RateLimiter {
    max: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

struct WindowState {
    window_start: Instant,
    used: u32,
}

impl RateLimiter {
    /// Limiter allowing `max` jobs per `window`.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Take one slot, waiting for the next window if the current one is full.
    pub async fn acquire(&self) {
        loop {
            let wait_until = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                if now.duration_since(state.window_start) >= self.window {
                    state.window_start = now;
                    state.used = 0;
                }

                if state.used < self.max {
                    state.used += 1;
                    return;
                }

                state.window_start + self.window
            };

            // Lock released while we sleep out the rest of the window.
            sleep_until(wait_until).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_max_immediately() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_waits_for_next_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(Instant::now().duration_since(start) >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_idle() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.acquire().await;

        tokio::time::sleep(Duration::from_secs(61)).await;

        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(Instant::now(), before);
    }
}
