use super::cancel::CancelToken;
use super::state::BufferState;
use super::wait::{wait_to_millis, SleepRemaining, WaitPolicy, WaitUnit};
use crate::errors::{BufferError, Result};
use crate::store::SessionStore;
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

/// One string fragment plus its debounce parameters, as supplied by the host
/// collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    /// Identifier grouping all submissions destined for one buffer.
    pub session_key: String,
    /// The fragment to accumulate.
    pub content: String,
    /// Quiet period restarted by this submission; non-negative.
    pub wait_amount: f64,
    pub wait_unit: WaitUnit,
    /// Prefix the session key with the coordinator's scope id so identical
    /// literal keys in unrelated executions never meet.
    #[serde(default)]
    pub avoid_collisions: bool,
}

impl Submission {
    pub fn new(
        session_key: impl Into<String>,
        content: impl Into<String>,
        wait_amount: f64,
        wait_unit: WaitUnit,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            content: content.into(),
            wait_amount,
            wait_unit,
            avoid_collisions: false,
        }
    }

    pub fn avoiding_collisions(mut self) -> Self {
        self.avoid_collisions = true;
        self
    }
}

/// What a single submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// This invocation opened the buffer, outlasted the quiet period, and
    /// drained the accumulated batch.
    Released(Vec<String>),
    /// Joined an open buffer and returned immediately; the opener will
    /// release the batch.
    Skipped,
    /// Cancelled while waiting. The key was cleaned up; no result.
    Cancelled,
}

/// Create-path lifecycle. Advanced by a single rule: re-read the deadline,
/// recompute the remaining time, then sleep or drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Waiting,
    Draining,
    Cancelled,
    Errored,
}

/// What one read of the stored value told us.
enum ReadState {
    Absent,
    /// The key exists but does not hold a readable buffer state.
    Garbage,
    Open(BufferState, Vec<u8>),
}

/// Owns the full submit protocol: state read, merge, re-arm, wait, drain.
///
/// The store is the sole source of truth; the coordinator never caches
/// buffer state between operations. Backends with `compare_and_set` get
/// race-free create and join writes; plain get/set backends fall back to
/// last-writer-wins, accepting the documented create/create race.
pub struct Coordinator {
    store: Arc<dyn SessionStore>,
    scope_id: String,
    wait_policy: Box<dyn WaitPolicy>,
}

impl Coordinator {
    /// `scope_id` is the execution identifier used as the key namespace when
    /// a submission opts into collision avoidance.
    pub fn new(store: Arc<dyn SessionStore>, scope_id: impl Into<String>) -> Self {
        Self {
            store,
            scope_id: scope_id.into(),
            wait_policy: Box::new(SleepRemaining),
        }
    }

    pub fn with_wait_policy(mut self, policy: Box<dyn WaitPolicy>) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Namespacing is a pure string transform applied before any store
    /// access; the rest of the protocol never sees the undecorated key.
    fn derive_key(&self, submission: &Submission) -> String {
        if submission.avoid_collisions {
            format!("{}:{}", self.scope_id, submission.session_key)
        } else {
            submission.session_key.clone()
        }
    }

    /// Submit one fragment. The first submission for a key opens the buffer
    /// and blocks until the quiet period elapses; later submissions append,
    /// push the deadline to `now + their own wait`, and return `Skipped`.
    pub async fn submit(&self, submission: &Submission, cancel: CancelToken) -> Result<Outcome> {
        if submission.session_key.is_empty() {
            return Err(BufferError::EmptySessionKey.into());
        }
        let wait_ms = wait_to_millis(submission.wait_amount, submission.wait_unit);
        let key = self.derive_key(submission);
        let mut attempts: u32 = 0;

        loop {
            match self.read_state(&key).await? {
                ReadState::Absent => {
                    let state = BufferState::open(submission.content.clone(), wait_ms);
                    let bytes = serde_json::to_vec(&state)?;
                    let created = if self.store.supports_cas() {
                        self.store.compare_and_set(&key, None, &bytes).await?
                    } else {
                        self.store.set(&key, &bytes).await?;
                        true
                    };
                    if created {
                        counter!("quiesce_submissions_total", "path" => "create").increment(1);
                        debug!(key = %key, wait_ms, "opened buffer, entering wait loop");
                        return self.wait_and_drain(&key, cancel).await;
                    }
                    debug!(key = %key, "lost the create race, retrying as join");
                }
                ReadState::Garbage => {
                    // On the initial read an unreadable value counts as no
                    // state; full replacement disposes of it.
                    let state = BufferState::open(submission.content.clone(), wait_ms);
                    self.store.set(&key, &serde_json::to_vec(&state)?).await?;
                    counter!("quiesce_submissions_total", "path" => "create").increment(1);
                    debug!(key = %key, wait_ms, "replaced unreadable value, entering wait loop");
                    return self.wait_and_drain(&key, cancel).await;
                }
                ReadState::Open(mut state, old_bytes) => {
                    state.join(submission.content.clone(), wait_ms);
                    let bytes = serde_json::to_vec(&state)?;
                    let joined = if self.store.supports_cas() {
                        self.store
                            .compare_and_set(&key, Some(&old_bytes), &bytes)
                            .await?
                    } else {
                        self.store.set(&key, &bytes).await?;
                        true
                    };
                    if joined {
                        counter!("quiesce_submissions_total", "path" => "join").increment(1);
                        trace!(key = %key, count = state.items.len(), "joined open buffer");
                        return Ok(Outcome::Skipped);
                    }
                    debug!(key = %key, "join write conflicted, retrying");
                }
            }

            attempts = attempts.saturating_add(1);
            let backoff = 10u64.saturating_mul(1 << attempts.min(4));
            tokio::time::sleep(Duration::from_millis(backoff + jitter_ms(25))).await;
        }
    }

    async fn read_state(&self, key: &str) -> Result<ReadState> {
        match self.store.get(key).await? {
            None => Ok(ReadState::Absent),
            Some(bytes) => match serde_json::from_slice::<BufferState>(&bytes) {
                Ok(state) => Ok(ReadState::Open(state, bytes)),
                Err(e) => {
                    warn!(key = %key, error = %e, "stored value is not a readable buffer state");
                    Ok(ReadState::Garbage)
                }
            },
        }
    }

    /// Create-path wait loop. Sleeps are bounded by the wait policy and the
    /// deadline is re-read on every wake, so a join that pushed (or pulled)
    /// the deadline while we slept always wins over the one we started with.
    async fn wait_and_drain(&self, key: &str, mut cancel: CancelToken) -> Result<Outcome> {
        let mut phase = Phase::Created;
        loop {
            match phase {
                Phase::Created | Phase::Waiting => {
                    if cancel.is_cancelled() {
                        phase = Phase::Cancelled;
                        continue;
                    }
                    let state = match self.read_state(key).await? {
                        ReadState::Open(state, _) => state,
                        // Past the create write, the state must exist; its
                        // absence means the key was deleted or corrupted out
                        // of band and the batch is gone.
                        ReadState::Absent | ReadState::Garbage => {
                            phase = Phase::Errored;
                            continue;
                        }
                    };
                    let remaining = Duration::from_millis(state.remaining_ms());
                    if remaining.is_zero() {
                        phase = Phase::Draining;
                        continue;
                    }
                    let sleep_for = self.wait_policy.next_sleep(remaining);
                    trace!(
                        key = %key,
                        remaining_ms = remaining.as_millis() as u64,
                        "buffer still open, suspending"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => phase = Phase::Cancelled,
                        _ = tokio::time::sleep(sleep_for) => phase = Phase::Waiting,
                    }
                }
                Phase::Draining => {
                    // One last read: a join may have landed after the final
                    // wake observed a passed deadline.
                    let items = match self.read_state(key).await? {
                        ReadState::Open(state, _) => state.items,
                        ReadState::Absent | ReadState::Garbage => {
                            phase = Phase::Errored;
                            continue;
                        }
                    };
                    self.store.delete(key).await?;
                    counter!("quiesce_drains_total").increment(1);
                    debug!(key = %key, count = items.len(), "buffer drained");
                    return Ok(Outcome::Released(items));
                }
                Phase::Cancelled => {
                    // Best effort: leave no orphaned buffer behind.
                    if let Err(e) = self.store.delete(key).await {
                        warn!(key = %key, error = %e, "cleanup delete failed after cancellation");
                    }
                    counter!("quiesce_cancellations_total").increment(1);
                    debug!(key = %key, "wait cancelled, buffer discarded");
                    return Ok(Outcome::Cancelled);
                }
                Phase::Errored => {
                    counter!("quiesce_state_lost_total").increment(1);
                    return Err(BufferError::StateLost(key.to_string()).into());
                }
            }
        }
    }
}

fn jitter_ms(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % max
}
