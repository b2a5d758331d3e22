//! In-memory sliding-window rate limiter guarding the public token
//! endpoints. Production deployments behind multiple replicas would want
//! a shared store instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, Window>>>,
    max_requests: u32,
    window: Duration,
}

struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Record one request for the identifier (IP or token) and report
    /// whether it is within budget.
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        let window = windows.entry(identifier.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.max_requests {
            window.count += 1;
            true
        } else {
            false
        }
    }

    /// Drop windows that have fully elapsed; call periodically.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        windows.retain(|_, w| now.duration_since(w.started) < self.window);
        tracing::debug!("Rate limiter cleanup: {} active identifiers", windows.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_over_budget_per_identifier() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check("1.2.3.4").await);
        assert!(limiter.check("1.2.3.4").await);
        assert!(limiter.check("1.2.3.4").await);
        assert!(!limiter.check("1.2.3.4").await);

        // Other identifiers keep their own budget.
        assert!(limiter.check("5.6.7.8").await);
    }

    #[tokio::test]
    async fn window_expiry_resets_budget() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.check("ip").await);
        assert!(!limiter.check("ip").await);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check("ip").await);
    }

    #[tokio::test]
    async fn cleanup_drops_elapsed_windows() {
        let limiter = RateLimiter::new(5, 1);
        limiter.check("a").await;
        limiter.check("b").await;

        tokio::time::sleep(Duration::from_millis(1100)).await;
        limiter.cleanup().await;

        let windows = limiter.windows.read().await;
        assert!(windows.is_empty());
    }
}
