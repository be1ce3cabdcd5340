use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The single record stored under a session key while its buffer is open.
///
/// `expiry` is a rolling deadline: every write stamps it with `now + wait`,
/// so only the most recent writer's quiet period counts. `items` grows on
/// every join and is removed wholesale by the draining invocation's delete;
/// no write ever shrinks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferState {
    /// Absolute deadline, milliseconds since the Unix epoch.
    pub expiry: u64,
    /// Accumulated contents in arrival order, as seen by the last writer.
    pub items: Vec<String>,
}

impl BufferState {
    /// Fresh buffer holding the opening submission.
    pub fn open(content: String, wait_ms: u64) -> Self {
        Self {
            expiry: now_ms().saturating_add(wait_ms),
            items: vec![content],
        }
    }

    /// Append a joining submission and restamp the deadline with the joiner's
    /// own wait. The deadline is overwritten, not extended relative to the
    /// previous value, so a shorter-wait joiner can pull it closer.
    pub fn join(&mut self, content: String, wait_ms: u64) {
        self.items.push(content);
        self.expiry = now_ms().saturating_add(wait_ms);
    }

    pub fn remaining_ms(&self) -> u64 {
        self.expiry.saturating_sub(now_ms())
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
