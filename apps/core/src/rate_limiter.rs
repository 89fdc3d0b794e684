use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A per-sender rate limiter using a sliding window algorithm.
///
/// It tracks request timestamps for each sender to decide whether a new inbound
/// message may reach the (rate-limited) generative backend. Safe to share between
/// request tasks; the lock is never held across an `.await`.
pub struct RateLimiter {
    /// Stores timestamps of recent requests for each sender.
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
    /// The maximum number of requests allowed within the `window`. Zero disables limiting.
    limit: usize,
    /// The duration of the sliding window.
    window: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter`.
    ///
    /// # Arguments
    ///
    /// * `limit` - The number of requests allowed per `window`; `0` allows everything.
    /// * `window` - The time duration of the sliding window.
    pub fn new(limit: usize, window: Duration) -> Self {
        RateLimiter {
            requests: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// Checks if a request from `sender` is allowed, recording it when it is.
    pub fn check(&self, sender: &str) -> bool {
        if self.limit == 0 {
            return true;
        }
        let now = Instant::now();
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let timestamps = requests.entry(sender.to_string()).or_default();

        // Remove timestamps older than the window
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() < self.limit {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drops senders with no request inside the window. Returns how many were dropped.
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let before = requests.len();
        requests.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });
        before - requests.len()
    }

    pub fn tracked_senders(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
