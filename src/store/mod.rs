//! Key-value store capability
//!
//! The cache treats its backend as an opaque byte store. Two implementations
//! ship with the crate: [`RedisStore`] for real deployments and [`MemoryStore`]
//! for tests and single-process use.

use async_trait::async_trait;

use crate::error::StoreError;

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Opaque GET/SET/SETEX/DEL/EXISTS/KEYS capability.
///
/// Implementations must report every failure as a [`StoreError`]; the cache
/// treats all of them as transient and falls back to the producer.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// A name for logging, e.g. `"redis"` or `"memory"`.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store without expiry.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Store with an expiry of `seconds`.
    async fn set_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<(), StoreError>;

    /// Returns whether a key was removed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Keys matching a Redis-style glob pattern. Operator use only.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}
