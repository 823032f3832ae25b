//! Cache error types
//!
//! Two kinds of fault reach the read-through path and they are handled
//! differently: a [`SerializationFault`] purges the offending entry, a
//! [`StoreError`] only degrades the call to passthrough.

use redis::RedisError;

/// Boxed error used by pluggable stores and codecs.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A value could not be encoded to, or decoded from, its stored bytes.
#[derive(Debug, thiserror::Error)]
#[error("Serialization fault: {0}")]
pub struct SerializationFault(#[source] pub BoxError);

impl SerializationFault {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(err.into())
    }
}

impl From<serde_json::Error> for SerializationFault {
    fn from(err: serde_json::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Errors raised by a key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Other(#[from] BoxError),
}

/// Cache-related errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Serialization(#[from] SerializationFault),

    #[error("Backend error: {0}")]
    Backend(#[from] StoreError),
}

impl CacheError {
    pub fn is_serialization(&self) -> bool {
        matches!(self, CacheError::Serialization(_))
    }
}
