//! Key-value session store abstraction.
//!
//! The coordinator treats the store as an external capability: plain
//! `get`/`set`/`delete` by key, full-value replacement, no store-level TTL.
//! Backends that can do better advertise `compare_and_set`, which the
//! coordinator prefers when present.

pub mod connector;
pub mod local_backend;
pub mod redis_backend;

pub use connector::StoreConfig;
pub use local_backend::LocalStore;
pub use redis_backend::RedisStore;

use crate::errors::StoreError;

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Full replacement of whatever is stored under `key`.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;

    /// Whether `compare_and_set` is usable on this backend.
    fn supports_cas(&self) -> bool {
        false
    }

    /// Atomically replace the value under `key` only if it still equals `old`.
    /// `old == None` means "create only if absent". Returns whether the swap
    /// took place.
    async fn compare_and_set(
        &self,
        key: &str,
        old: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StoreError> {
        let _ = (key, old, new);
        Err(StoreError::CasUnsupported)
    }
}
