//! Sliding-window rate limiter for outbound provider requests
//!
//! Two windows are enforced simultaneously: a 1-second window capped at
//! `requests_per_second` admissions and a 60-second window capped at
//! `requests_per_minute`, plus a minimum spacing of `1/rps` between
//! consecutive admissions. The per-minute cap is mutable so the HTTP layer
//! can throttle down when the provider reports depleted quota.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

struct WindowState {
    second_window: VecDeque<Instant>,
    minute_window: VecDeque<Instant>,
    requests_per_minute: u32,
    last_admission: Option<Instant>,
}

/// Serializes outbound requests under both provider windows.
///
/// `acquire` never fails; it only waits. Admission order under contention is
/// first-ready rather than strictly FIFO.
pub struct RateLimiter {
    requests_per_second: f64,
    min_interval: Duration,
    state: Mutex<WindowState>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(requests_per_second: f64, requests_per_minute: u32) -> Self {
        let rps = requests_per_second.max(0.1);
        Self {
            requests_per_second: rps,
            min_interval: Duration::from_secs_f64(1.0 / rps),
            state: Mutex::new(WindowState {
                second_window: VecDeque::new(),
                minute_window: VecDeque::new(),
                requests_per_minute: requests_per_minute.max(1),
                last_admission: None,
            }),
        }
    }

    /// Block until one request slot is available in both windows, then
    /// record the admission.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                Self::purge(&mut state.second_window, now, Duration::from_secs(1));
                Self::purge(&mut state.minute_window, now, Duration::from_secs(60));

                match self.next_wait(&state, now) {
                    Some(wait) => wait,
                    None => {
                        state.second_window.push_back(now);
                        state.minute_window.push_back(now);
                        state.last_admission = Some(now);
                        return;
                    }
                }
            };
            sleep(wait).await;
        }
    }

    /// Atomically update the per-minute cap (adaptive server feedback)
    pub async fn set_requests_per_minute(&self, requests_per_minute: u32) {
        let mut state = self.state.lock().await;
        if state.requests_per_minute != requests_per_minute {
            debug!(
                from = state.requests_per_minute,
                to = requests_per_minute,
                "rate limiter per-minute cap adjusted"
            );
            state.requests_per_minute = requests_per_minute.max(1);
        }
    }

    /// Current per-minute cap
    pub async fn requests_per_minute(&self) -> u32 {
        self.state.lock().await.requests_per_minute
    }

    fn purge(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= span {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long until an admission is possible; None if admissible now
    fn next_wait(&self, state: &WindowState, now: Instant) -> Option<Duration> {
        let mut wait = Duration::ZERO;

        if state.second_window.len() >= self.requests_per_second as usize {
            if let Some(oldest) = state.second_window.front() {
                wait = wait.max(Duration::from_secs(1).saturating_sub(now.duration_since(*oldest)));
            }
        }

        if state.minute_window.len() >= state.requests_per_minute as usize {
            if let Some(oldest) = state.minute_window.front() {
                wait = wait.max(Duration::from_secs(60).saturating_sub(now.duration_since(*oldest)));
            }
        }

        if let Some(last) = state.last_admission {
            let since_last = now.duration_since(last);
            if since_last < self.min_interval {
                wait = wait.max(self.min_interval - since_last);
            }
        }

        if wait.is_zero() {
            None
        } else {
            Some(wait)
        }
    }
}
