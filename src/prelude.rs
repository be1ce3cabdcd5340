// Coordinator
pub use crate::buffer::{
    cancel_pair, BatchOutput, CancelHandle, CancelToken, Coordinator, Outcome, ReleasedItem,
    SkippedAck, Submission, WaitUnit,
};

// Errors
pub use crate::errors::{BoxError, Error, ErrorKind, Result};

// Store
pub use crate::store::{LocalStore, RedisStore, SessionStore, StoreConfig};

pub mod buffer {
    pub use crate::buffer::cancel_pair;
    pub use crate::buffer::BufferState;
    pub use crate::buffer::CancelHandle;
    pub use crate::buffer::CancelToken;
    pub use crate::buffer::Coordinator;
    pub use crate::buffer::FixedPoll;
    pub use crate::buffer::Outcome;
    pub use crate::buffer::SleepRemaining;
    pub use crate::buffer::Submission;
    pub use crate::buffer::WaitPolicy;
    pub use crate::buffer::WaitUnit;
}
pub mod store {
    pub use crate::store::LocalStore;
    pub use crate::store::RedisStore;
    pub use crate::store::SessionStore;
    pub use crate::store::StoreConfig;
}
pub mod errors {
    pub use crate::errors::BoxError;
    pub use crate::errors::BufferError;
    pub use crate::errors::CredentialError;
    pub use crate::errors::Error;
    pub use crate::errors::ErrorKind;
    pub use crate::errors::Result;
    pub use crate::errors::StoreError;
}
