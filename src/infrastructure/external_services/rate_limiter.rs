use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// The limiter refused a slot within the bounded queue wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub would_wait: Duration,
    pub max_wait: Duration,
}

impl std::fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rate limit queue wait {}ms exceeds cap {}ms",
            self.would_wait.as_millis(),
            self.max_wait.as_millis()
        )
    }
}

impl std::error::Error for RateLimitExceeded {}

/// Spaces outbound calls to at most `requests_per_second`. Callers
/// reserve the next free slot under a short lock, then sleep outside it,
/// so a slow caller never blocks the others from reserving theirs.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_wait: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64, max_wait: Duration) -> Self {
        let min_interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            max_wait,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait for the next slot, or fail fast when the backlog already
    /// exceeds the wait cap.
    pub async fn acquire(&self) -> Result<(), RateLimitExceeded> {
        if self.min_interval.is_zero() {
            return Ok(());
        }

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next_slot).max(now);
            let would_wait = slot.saturating_duration_since(now);
            if would_wait > self.max_wait {
                return Err(RateLimitExceeded {
                    would_wait,
                    max_wait: self.max_wait,
                });
            }
            *next_slot = slot + self.min_interval;
            slot
        };

        tokio::time::sleep_until(slot).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spaces_consecutive_calls() {
        let limiter = RateLimiter::new(50.0, Duration::from_secs(10));
        let started = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }

        // Three calls at 50 rps need at least two 20ms gaps.
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_bounded_wait_rejects_backlog() {
        let limiter = Arc::new(RateLimiter::new(10.0, Duration::from_millis(150)));

        // Reserve slots far enough ahead that a later caller would have
        // to wait past the cap.
        let mut outcomes = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            // Reserve without awaiting the sleep by racing reservations.
            outcomes.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        let results: Vec<_> = futures::future::join_all(outcomes)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let rejected = results.iter().filter(|r| r.is_err()).count();
        let admitted = results.iter().filter(|r| r.is_ok()).count();
        assert!(rejected >= 1);
        assert!(admitted >= 2);
    }

    #[tokio::test]
    async fn test_zero_rate_disables_limiting() {
        let limiter = RateLimiter::new(0.0, Duration::from_millis(1));
        let started = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await.unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
