use rand::Rng;
use std::time::Duration;

pub const RECONNECT_BACKOFF_BASE: Duration = Duration::from_secs(10);
pub const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(15 * 60);

/// Exponential reconnect interval, doubled on each failure and capped
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.min(max);
        return Backoff { base, max, current: base };
    }

    /// Interval to wait after this failure, the following one will be twice as long
    pub fn next_interval(&mut self) -> Duration {
        let interval = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        interval
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RECONNECT_BACKOFF_BASE, RECONNECT_BACKOFF_MAX)
    }
}

/// Adds up to 10% random delay so bridges that failed together do not
/// all come back in the same second
pub fn with_jitter(interval: Duration) -> Duration {
    let max_jitter = u64::try_from((interval / 10).as_nanos()).unwrap_or(u64::MAX);
    if max_jitter == 0 {
        return interval;
    }
    let jitter = rand::thread_rng().gen_range(0..max_jitter);
    interval.saturating_add(Duration::from_nanos(jitter))
}
