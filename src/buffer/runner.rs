use super::cancel::CancelToken;
use super::coordinator::{Coordinator, Outcome, Submission};
use crate::errors::Result;
use serde::Serialize;
use tracing::warn;

/// Item emitted on the released channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReleasedItem {
    /// The accumulated batch from a completed create path.
    Batch { items: Vec<String> },
    /// A per-submission failure, emitted instead of aborting when the caller
    /// opted into continue-on-fail.
    Error { error: String },
}

/// Empty acknowledgment emitted on the skipped channel for each join-path
/// submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkippedAck {}

/// Aggregated results of a batch of submissions, mirroring the two output
/// channels of the host interface.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutput {
    pub released: Vec<ReleasedItem>,
    pub skipped: Vec<SkippedAck>,
}

impl Coordinator {
    /// Thin loop over [`Coordinator::submit`], one call per item. Errors are
    /// attributed to the submission that hit them: with `continue_on_fail`
    /// the failing item becomes an error-carrying released entry and the
    /// batch proceeds, otherwise the first error aborts the batch.
    /// Cancellation stops the batch silently.
    pub async fn run_batch(
        &self,
        submissions: &[Submission],
        continue_on_fail: bool,
        cancel: CancelToken,
    ) -> Result<BatchOutput> {
        let mut output = BatchOutput::default();
        for submission in submissions {
            match self.submit(submission, cancel.clone()).await {
                Ok(Outcome::Released(items)) => output.released.push(ReleasedItem::Batch { items }),
                Ok(Outcome::Skipped) => output.skipped.push(SkippedAck::default()),
                Ok(Outcome::Cancelled) => break,
                Err(e) if continue_on_fail => {
                    warn!(
                        session_key = %submission.session_key,
                        error = %e,
                        "submission failed, continuing batch"
                    );
                    output.released.push(ReleasedItem::Error {
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(output)
    }
}
