use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Token-bucket limiter gating new xDS requests. Exceeding the bucket waits
/// up to `grace` for a token to free up before reporting exhaustion, rather
/// than rejecting immediately.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    grace: Duration,
    state: Mutex<State>,
}

struct State {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_sec: u32, grace: Duration) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec: refill_per_sec as f64,
            grace,
            state: Mutex::new(State { tokens: capacity as f64, last_refill: Instant::now() }),
        }
    }

    fn refill(&self, state: &mut State) {
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = Instant::now();
    }

    fn try_acquire_locked(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Waits up to `grace` for a token, polling at a fixed interval. Returns
    /// `false` (exhausted — the caller should answer `ResourceExhausted`)
    /// if none frees up in time.
    pub async fn acquire(&self) -> bool {
        if self.try_acquire_locked() {
            return true;
        }
        let deadline = Instant::now() + self.grace;
        let poll_interval = Duration::from_millis(25);
        loop {
            tokio::time::sleep(poll_interval).await;
            if self.try_acquire_locked() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn exhausted_bucket_times_out_after_grace() {
        let limiter = RateLimiter::new(1, 1, Duration::from_millis(50));
        assert!(limiter.acquire().await);
        assert!(!limiter.acquire().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refill_eventually_grants_another_token() {
        let limiter = RateLimiter::new(1, 100, Duration::from_millis(200));
        assert!(limiter.acquire().await);
        assert!(limiter.acquire().await);
    }
}
