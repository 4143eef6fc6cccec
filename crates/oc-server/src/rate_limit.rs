use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use tokio::sync::Mutex;

/// Per-IP token bucket for rate limiting.
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// IP-based rate limiter using token bucket algorithm.
pub struct IpRateLimiter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl IpRateLimiter {
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            refill_rate,
        }
    }

    /// Check and consume one token for `ip`. Returns false if the bucket is empty.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let bucket = buckets.entry(ip).or_insert_with(|| TokenBucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Remove buckets that haven't been touched in `max_idle`, bounding
    /// memory use from a churn of distinct client IPs.
    pub async fn cleanup(&self, max_idle: std::time::Duration) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, b| now.duration_since(b.last_refill) < max_idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    #[tokio::test]
    async fn allows_requests_within_burst() {
        let limiter = IpRateLimiter::new(5.0, 1.0);
        let ip = test_ip();
        for _ in 0..5 {
            assert!(limiter.check_rate_limit(ip).await);
        }
        assert!(!limiter.check_rate_limit(ip).await);
    }

    #[tokio::test]
    async fn different_ips_have_independent_buckets() {
        let limiter = IpRateLimiter::new(1.0, 1.0);
        let ip1 = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let ip2 = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.check_rate_limit(ip1).await);
        assert!(limiter.check_rate_limit(ip2).await);
        assert!(!limiter.check_rate_limit(ip1).await);
    }

    #[tokio::test]
    async fn cleanup_removes_stale_buckets() {
        let limiter = IpRateLimiter::new(5.0, 1.0);
        let ip = test_ip();
        limiter.check_rate_limit(ip).await;
        assert_eq!(limiter.buckets.lock().await.len(), 1);
        limiter.cleanup(std::time::Duration::from_secs(0)).await;
        assert_eq!(limiter.buckets.lock().await.len(), 0);
    }
}
