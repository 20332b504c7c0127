//! Fixed-window, per-client request limiting.
//!
//! Each client identity owns one window. The first request opens it with a count of 1;
//! later requests in the same window are admitted until the count reaches the limit.
//! Denied requests do not advance the count, and an elapsed window is replaced
//! on the next request, so nothing carries over between windows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Counter for one client identity.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

impl RateWindow {
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) >= window
    }
}

/// Outcome of a single limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's current window ends.
    pub reset_after: Duration,
}

/// Per-identity fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { windows: Mutex::new(HashMap::new()), max_requests, window }
    }

    /// Record a request from `identity` and decide whether it may proceed.
    pub async fn check(&self, identity: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let state = windows
            .entry(identity.to_string())
            .or_insert(RateWindow { count: 0, window_start: now });
        if state.is_expired(now, self.window) {
            *state = RateWindow { count: 0, window_start: now };
        }

        let allowed = state.count < self.max_requests;
        if allowed {
            state.count += 1;
        }

        RateDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(state.count),
            reset_after: self.window.saturating_sub(now.duration_since(state.window_start)),
        }
    }

    /// Convenience wrapper around [`check`](Self::check).
    pub async fn allow(&self, identity: &str) -> bool {
        self.check(identity).await.allowed
    }

    /// Drop windows that have elapsed. Returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, state| !state.is_expired(now, self.window));
        before - windows.len()
    }

    /// Number of identities currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }

    #[must_use]
    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Start background cleanup of idle client windows.
    pub fn start_cleanup_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.window);
            loop {
                interval.tick().await;
                let removed = self.prune_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "Pruned expired rate-limit windows");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_max_then_denies() {
        let limiter = RateLimiter::new(5, WINDOW);
        for _ in 0..5 {
            assert!(limiter.allow("1.2.3.4").await);
        }
        assert!(!limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let limiter = RateLimiter::new(3, WINDOW);
        let mut remaining = Vec::new();
        for _ in 0..4 {
            remaining.push(limiter.check("c").await.remaining);
        }
        assert_eq!(remaining, vec![2, 1, 0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new(2, WINDOW);
        assert!(limiter.allow("c").await);
        assert!(limiter.allow("c").await);
        assert!(!limiter.allow("c").await);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!limiter.allow("c").await);

        tokio::time::advance(Duration::from_secs(1)).await;
        let decision = limiter.check("c").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denials_do_not_carry_into_next_window() {
        let limiter = RateLimiter::new(1, WINDOW);
        assert!(limiter.allow("c").await);
        for _ in 0..100 {
            assert!(!limiter.allow("c").await);
        }
        tokio::time::advance(WINDOW).await;
        assert!(limiter.allow("c").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identities_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        assert!(limiter.allow("a").await);
        assert!(!limiter.allow("a").await);
        assert!(limiter.allow("b").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_after_tracks_window_start() {
        let limiter = RateLimiter::new(5, WINDOW);
        limiter.check("c").await;
        tokio::time::advance(Duration::from_secs(20)).await;
        let decision = limiter.check("c").await;
        assert_eq!(decision.reset_after, Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_denies_everything() {
        let limiter = RateLimiter::new(0, WINDOW);
        assert!(!limiter.allow("c").await);
        assert!(!limiter.allow("c").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_expired_removes_idle_clients() {
        let limiter = RateLimiter::new(5, WINDOW);
        limiter.check("old").await;
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check("new").await;
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(limiter.prune_expired().await, 1);
        assert_eq!(limiter.tracked_clients().await, 1);
    }
}
