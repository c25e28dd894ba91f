//! Sliding-window rate limiter for arXiv API requests.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration, Instant};

use crate::error::{ArxivError, Result};

/// Rate limiter that enforces at most `calls` requests per rolling `period`,
/// and caps in-flight requests at `calls` via a semaphore gate.
///
/// Cloning is cheap and every clone shares the same window, so one instance
/// can be handed to every collaborator that issues requests. The window is
/// the only shared mutable state in the crate; prune, check, and append
/// happen under a single lock so two concurrent acquirers can never claim
/// the same slot.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Arc<Mutex<VecDeque<Instant>>>,
    permits: Arc<Semaphore>,
    calls: usize,
    period: Duration,
}

/// Read-only snapshot of the limiter window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitState {
    /// Slots still free in the current window.
    pub remaining: usize,
    /// When the oldest recorded call leaves the window.
    pub reset_at: Instant,
    /// Time the snapshot was taken.
    pub window_start: Instant,
}

/// Held for the duration of one outbound request; dropping it frees a
/// concurrency slot.
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    /// Create a limiter allowing `calls` requests per `period_secs` seconds.
    ///
    /// Fails with [`ArxivError::InvalidConfiguration`] when either bound is
    /// not positive.
    pub fn new(calls: usize, period_secs: f64) -> Result<Self> {
        if calls == 0 {
            return Err(ArxivError::InvalidConfiguration(
                "rate limit calls must be greater than zero".to_string(),
            ));
        }
        let period = Duration::try_from_secs_f64(period_secs).map_err(|_| {
            ArxivError::InvalidConfiguration(format!(
                "rate limit period must be a positive number of seconds, got {period_secs}"
            ))
        })?;
        if period.is_zero() {
            return Err(ArxivError::InvalidConfiguration(
                "rate limit period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            window: Arc::new(Mutex::new(VecDeque::new())),
            permits: Arc::new(Semaphore::new(calls)),
            calls,
            period,
        })
    }

    /// Wait until a slot is free, record the acceptance, and return a permit
    /// that bounds in-flight concurrency until dropped.
    pub async fn acquire(&self) -> RateLimitPermit {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("rate limiter semaphore is never closed");

        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                prune(&mut window, now, self.period);
                if window.len() < self.calls {
                    window.push_back(now);
                    return RateLimitPermit { _permit: permit };
                }
                match window.front() {
                    Some(&oldest) => (oldest + self.period).duration_since(now),
                    None => continue,
                }
            };

            if !wait.is_zero() {
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
                sleep(wait).await;
            }
        }
    }

    /// Snapshot the window without mutating it.
    pub async fn state(&self) -> RateLimitState {
        let window = self.window.lock().await;
        let now = Instant::now();
        let valid = valid_timestamps(&window, now, self.period);
        RateLimitState {
            remaining: self.calls.saturating_sub(valid.len()),
            reset_at: valid.first().map_or(now, |&oldest| oldest + self.period),
            window_start: now,
        }
    }

    /// True iff the window is full and the next `acquire` would wait.
    pub async fn is_limited(&self) -> bool {
        let window = self.window.lock().await;
        let now = Instant::now();
        valid_timestamps(&window, now, self.period).len() >= self.calls
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, period: Duration) {
    while let Some(&oldest) = window.front() {
        if now.duration_since(oldest) < period {
            break;
        }
        window.pop_front();
    }
}

fn valid_timestamps(window: &VecDeque<Instant>, now: Instant, period: Duration) -> Vec<Instant> {
    window
        .iter()
        .copied()
        .filter(|&t| now.duration_since(t) < period)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_rejects_zero_calls() {
        assert!(matches!(
            RateLimiter::new(0, 1.0),
            Err(ArxivError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_period() {
        assert!(RateLimiter::new(3, 0.0).is_err());
        assert!(RateLimiter::new(3, -1.0).is_err());
        assert!(RateLimiter::new(3, f64::NAN).is_err());
    }

    #[tokio::test]
    async fn test_first_acquisitions_are_immediate() {
        let limiter = RateLimiter::new(3, 1.0).unwrap();
        let start = Instant::now();
        let _a = limiter.acquire().await;
        let _b = limiter.acquire().await;
        let _c = limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_acquisition_past_window_capacity_blocks() {
        let limiter = RateLimiter::new(2, 0.3).unwrap();
        let start = Instant::now();
        drop(limiter.acquire().await);
        drop(limiter.acquire().await);

        assert!(limiter.is_limited().await);

        // The third acquisition must wait for the oldest slot to expire.
        drop(limiter.acquire().await);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_window_slides_clear_of_limit() {
        let limiter = RateLimiter::new(1, 0.2).unwrap();
        drop(limiter.acquire().await);
        assert!(limiter.is_limited().await);

        sleep(Duration::from_millis(250)).await;
        assert!(!limiter.is_limited().await);
    }

    #[tokio::test]
    async fn test_state_snapshot_does_not_mutate() {
        let limiter = RateLimiter::new(3, 1.0).unwrap();
        drop(limiter.acquire().await);

        let state = limiter.state().await;
        assert_eq!(state.remaining, 2);
        assert!(state.reset_at >= state.window_start);

        // Repeated snapshots see the same window.
        let again = limiter.state().await;
        assert_eq!(again.remaining, 2);
    }

    #[tokio::test]
    async fn test_concurrency_capped_at_calls() {
        let limiter = RateLimiter::new(3, 0.05).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..9 {
            let limiter = limiter.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let permit = limiter.acquire().await;
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
