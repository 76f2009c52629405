//! Simple in-memory sliding-window rate limiter for the session-exchange
//! endpoint. Production deployments behind more than one instance would move
//! this to a shared store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Check if a request is allowed for the given identifier (IP, user id).
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let history = requests.entry(identifier.to_string()).or_default();
        history.retain(|&timestamp| now.duration_since(timestamp) < self.window);

        if history.len() < self.max_requests {
            history.push(now);
            true
        } else {
            false
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check("test_ip").await);
        assert!(limiter.check("test_ip").await);
        assert!(limiter.check("test_ip").await);

        // 4th request should be blocked
        assert!(!limiter.check("test_ip").await);

        // Different IP should work
        assert!(limiter.check("other_ip").await);
    }

    #[tokio::test]
    async fn test_window_expiry() {
        let limiter = RateLimiter::new(1, 1);

        assert!(limiter.check("ip1").await);
        assert!(!limiter.check("ip1").await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(limiter.check("ip1").await);
    }
}
