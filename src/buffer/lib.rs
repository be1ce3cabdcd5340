//! Debounce coordination over a shared key-value session store.
//!
//! Concurrent submissions race on one stored record per session key: the
//! first writer opens the buffer and waits out the quiet period, every later
//! writer appends and pushes the deadline forward, and the opener drains the
//! accumulated batch once the deadline finally passes.

pub mod cancel;
pub mod coordinator;
pub mod runner;
pub mod state;
pub mod wait;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use coordinator::{Coordinator, Outcome, Submission};
pub use runner::{BatchOutput, ReleasedItem, SkippedAck};
pub use state::BufferState;
pub use wait::{wait_to_millis, FixedPoll, SleepRemaining, WaitPolicy, WaitUnit};

#[cfg(test)]
mod tests;
