//! callsite-cache - Read-through caching keyed by call site
//!
//! Wraps an expensive computation so its result is stored in a key-value
//! backend (usually Redis) and served from there on later calls:
//! - Keys derived from the call site, an optional discriminator and a prefix
//! - Writes to a primary store, reads from a randomly chosen replica
//! - Self-healing: undecodable or unencodable entries are purged
//! - Backend failures degrade to calling the producer directly
//!
//! ```rust,ignore
//! use callsite_cache::{Backend, Cache, CacheConfig, FetchOptions, RedisStore, call_site};
//!
//! let store = RedisStore::connect("redis://localhost:6379").await?;
//! let cache = Cache::new(CacheConfig::new().with_backend(Backend::single(store)));
//!
//! let report = cache
//!     .resolve(call_site!(), FetchOptions::new().key(&account_id), || async {
//!         build_report(account_id).await
//!     })
//!     .await;
//! ```

mod codec;
mod config;
mod error;
pub mod key;
mod read_through;
pub mod store;
mod topology;

pub use codec::{Codec, JsonCodec};
pub use config::CacheConfig;
pub use error::{BoxError, CacheError, SerializationFault, StoreError};
pub use key::{CallSite, DIGEST_LEN, Prefix};
pub use read_through::{Cache, FetchOptions};
pub use store::{MemoryStore, RedisStore, Store};
pub use topology::{Backend, BackendTopology, StoreHandle};

// Re-export async_trait for custom Store implementations
pub use async_trait::async_trait;
