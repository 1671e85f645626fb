//! Outbound pacing: inter-batch pauses and an optional per-minute cap.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

const WINDOW: Duration = Duration::from_secs(60);

/// Time source for pacing
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on; records every sleep
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += duration;
        }
    }

    /// Every duration slept so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
    }
}

#[derive(Debug, Default)]
struct Window {
    started: Duration,
    count: u32,
}

/// Paces outbound sends.
///
/// Holds its own state so separate orchestrators never share counters.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    max_per_minute: Option<u32>,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, max_per_minute: Option<u32>) -> Self {
        let started = clock.now();
        Self {
            clock,
            max_per_minute: max_per_minute.filter(|max| *max > 0),
            window: Mutex::new(Window { started, count: 0 }),
        }
    }

    /// Limiter with no per-minute cap
    pub fn unlimited(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, None)
    }

    /// Wait until one more message may go out
    pub async fn acquire(&self) {
        let Some(max) = self.max_per_minute else {
            return;
        };

        loop {
            let wait = {
                let now = self.clock.now();
                let mut window = match self.window.lock() {
                    Ok(window) => window,
                    Err(poisoned) => poisoned.into_inner(),
                };

                if now.saturating_sub(window.started) >= WINDOW {
                    window.started = now;
                    window.count = 0;
                }

                if window.count < max {
                    window.count += 1;
                    return;
                }

                WINDOW.saturating_sub(now.saturating_sub(window.started))
            };

            tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            self.clock.sleep(wait).await;
        }
    }

    /// Pause between batches
    pub async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            self.clock.sleep(duration).await;
        }
    }
}
