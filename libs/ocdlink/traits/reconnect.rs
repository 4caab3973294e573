use std::time::Duration;

/// Delay applied between failed connection attempts
///
/// The worker never gives up: a policy only decides how long to wait
/// before the next attempt. `attempt` counts consecutive failures since
/// the last successful connection, starting at 0.
pub trait ReconnectPolicy: Send + Sync + 'static {
    /// Delay before retrying after failed attempt number `attempt`
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Constant delay between attempts
///
/// The default policy waits 100ms, which suits a local debug server that
/// may restart at any moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Delay doubling on each failure, capped at `max_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
