//! Pacing of calls to the classification service.

use std::time::Duration;

use futures::future::BoxFuture;
use log::debug;
use tokio::time::{sleep, sleep_until, Instant};

use crate::config::{LimiterKind, RateLimitConfig};

/// Awaited before every classification call; told when a call completes.
pub trait RateLimiter: Send {
    fn acquire(&mut self) -> BoxFuture<'_, ()>;

    fn completed(&mut self) {}
}

/// Keeps `interval` between the end of one call and the start of the next.
/// The first call goes out immediately and nothing waits after the last.
pub struct FixedInterval {
    interval: Duration,
    last_completed: Option<Instant>,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        FixedInterval {
            interval,
            last_completed: None,
        }
    }
}

impl RateLimiter for FixedInterval {
    fn acquire(&mut self) -> BoxFuture<'_, ()> {
        let deadline = self.last_completed.map(|at| at + self.interval);
        Box::pin(async move {
            if let Some(deadline) = deadline {
                sleep_until(deadline).await;
            }
        })
    }

    fn completed(&mut self) {
        self.last_completed = Some(Instant::now());
    }
}

/// Allows bursts of up to `capacity` calls, refilling one token per `refill`.
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        TokenBucket {
            capacity,
            tokens: capacity,
            refill,
            last_refill: Instant::now(),
        }
    }

    fn refill_tokens(&mut self) {
        let now = Instant::now();
        if self.refill.is_zero() {
            self.tokens = self.capacity;
        } else {
            let earned = now.duration_since(self.last_refill).as_secs_f64() / self.refill.as_secs_f64();
            self.tokens = (self.tokens + earned).min(self.capacity);
        }
        self.last_refill = now;
    }
}

impl RateLimiter for TokenBucket {
    fn acquire(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            loop {
                self.refill_tokens();
                if self.tokens >= 1.0 {
                    self.tokens -= 1.0;
                    return;
                }
                let wait = self.refill.mul_f64(1.0 - self.tokens);
                debug!("Token bucket empty, waiting {:?}", wait);
                sleep(wait).await;
            }
        })
    }
}

/// Builds the limiter selected by configuration.
pub fn from_config(config: &RateLimitConfig) -> Box<dyn RateLimiter> {
    match config.kind {
        LimiterKind::FixedInterval => Box::new(FixedInterval::new(config.interval)),
        LimiterKind::TokenBucket => Box::new(TokenBucket::new(config.burst, config.interval)),
    }
}
