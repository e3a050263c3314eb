//! Admission control for run endpoints
//!
//! Every agent run and orchestration can fan out into many model calls and
//! sandbox executions, so both run endpoints draw from one token bucket:
//!
//! ```text
//! ┌─────────────┐
//! │   Bucket    │ ← holds up to `capacity` tokens
//! │  ● ● ● ●    │ ← refilled at `refill_rate` tokens per second
//! └─────────────┘
//!       │
//!       ▼
//! request: token available → consume one, admit
//!          bucket empty     → 429 with retry_after_ms
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Tokens are stored scaled by this factor so partial refills are kept
const SCALE: u64 = 1000;

/// Token bucket shared by all request handlers
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u64,
    refill_rate: f64,
    tokens_scaled: AtomicU64,
    last_refill: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a full bucket
    ///
    /// # Arguments
    /// * `capacity` - Burst size
    /// * `refill_rate` - Tokens added per second
    pub fn new(capacity: u64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens_scaled: AtomicU64::new(capacity * SCALE),
            last_refill: Mutex::new(Instant::now()),
        }
    }

    /// 20 burst, 2 runs per second sustained
    pub fn with_defaults() -> Self {
        Self::new(20, 2.0)
    }

    /// Take one token; `Err` carries how long until one is available
    pub fn try_acquire(&self) -> Result<(), RateLimited> {
        self.refill();
        loop {
            let current = self.tokens_scaled.load(Ordering::Relaxed);
            if current < SCALE {
                return Err(RateLimited::new(self.refill_rate, SCALE - current));
            }
            if self
                .tokens_scaled
                .compare_exchange(current, current - SCALE, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    fn refill(&self) {
        let now = Instant::now();
        let mut last = self.last_refill.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = now.duration_since(*last);
        let tokens_to_add = (elapsed.as_secs_f64() * self.refill_rate * SCALE as f64) as u64;
        if tokens_to_add == 0 {
            return;
        }
        *last = now;

        let max_scaled = self.capacity * SCALE;
        let _ = self
            .tokens_scaled
            .fetch_update(Ordering::SeqCst, Ordering::Relaxed, |current| {
                Some((current + tokens_to_add).min(max_scaled))
            });
    }

    pub fn available_tokens(&self) -> u64 {
        self.tokens_scaled.load(Ordering::Relaxed) / SCALE
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

/// Rejection returned when the bucket is empty
#[derive(Debug, Clone, Serialize)]
pub struct RateLimited {
    pub error: &'static str,
    pub retry_after_ms: u64,
}

impl RateLimited {
    fn new(refill_rate: f64, missing_scaled: u64) -> Self {
        let wait = if refill_rate > 0.0 {
            Duration::from_secs_f64(missing_scaled as f64 / SCALE as f64 / refill_rate)
        } else {
            Duration::from_secs(1)
        };
        Self {
            error: "rate limited",
            retry_after_ms: (wait.as_millis() as u64).max(1),
        }
    }
}
