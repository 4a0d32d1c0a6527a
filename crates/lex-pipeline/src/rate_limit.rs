//! Process-wide token bucket rate limiting.
//!
//! One limiter instance gates every outbound HTTP call in the pipeline;
//! the limiter is the only place this concern lives. Capacity is a single
//! token (no bursting) and `acquire()` suspends cooperatively until the
//! token replenishes. The lock is held across the wait, which serializes
//! waiters — intentional for a capacity-1 bucket.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Rate limiter contract with a real token bucket and a no-op for tests.
#[derive(Debug)]
pub enum RateLimiter {
    Bucket(TokenBucket),
    NoOp,
}

impl RateLimiter {
    /// Token bucket refilling at `requests_per_second` (default 0.5: one
    /// request every two seconds).
    #[must_use]
    pub fn token_bucket(requests_per_second: f64) -> Self {
        Self::Bucket(TokenBucket::new(requests_per_second))
    }

    /// Limiter that never waits.
    #[must_use]
    pub const fn no_op() -> Self {
        Self::NoOp
    }

    /// Wait until a request token is available.
    pub async fn acquire(&self) {
        if let Self::Bucket(bucket) = self {
            bucket.acquire().await;
        }
    }

    /// Reset to a full token (new batch, tests).
    pub async fn reset(&self) {
        if let Self::Bucket(bucket) = self {
            bucket.reset().await;
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// Capacity-1 token bucket.
#[derive(Debug)]
pub struct TokenBucket {
    requests_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    #[must_use]
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            requests_per_second,
            state: Mutex::new(BucketState {
                tokens: 1.0,
                last_update: Instant::now(),
            }),
        }
    }

    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();

        state.tokens = (state.tokens + elapsed * self.requests_per_second).min(1.0);

        if state.tokens < 1.0 {
            let wait = (1.0 - state.tokens) / self.requests_per_second;
            sleep(Duration::from_secs_f64(wait)).await;
            state.tokens = 0.0;
        } else {
            state.tokens -= 1.0;
        }

        state.last_update = Instant::now();
    }

    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.tokens = 1.0;
        state.last_update = Instant::now();
    }
}
