use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time unit of the caller-supplied quiet period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl WaitUnit {
    fn seconds_multiplier(self) -> f64 {
        match self {
            WaitUnit::Seconds => 1.0,
            WaitUnit::Minutes => 60.0,
            WaitUnit::Hours => 3_600.0,
            WaitUnit::Days => 86_400.0,
        }
    }
}

/// Normalize a caller-supplied wait to whole milliseconds. Negative amounts
/// clamp to zero; fractional amounts round after conversion.
pub fn wait_to_millis(amount: f64, unit: WaitUnit) -> u64 {
    let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
    (amount * unit.seconds_multiplier() * 1_000.0).round() as u64
}

/// Decides how long the create-path waiter suspends, given the remaining
/// time to the latest observed deadline.
pub trait WaitPolicy: Send + Sync {
    fn next_sleep(&self, remaining: Duration) -> Duration;
}

/// Sleep for exactly the remaining duration, then re-check. A join that
/// pushed the deadline forward in the meantime is picked up on the wake.
pub struct SleepRemaining;

impl WaitPolicy for SleepRemaining {
    fn next_sleep(&self, remaining: Duration) -> Duration {
        remaining
    }
}

/// Fixed-interval polling, capped at the remaining time. Wakes more often
/// but notices shortened deadlines sooner.
pub struct FixedPoll(pub Duration);

impl WaitPolicy for FixedPoll {
    fn next_sleep(&self, remaining: Duration) -> Duration {
        remaining.min(self.0)
    }
}
