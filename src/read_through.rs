//! Read-through cache keyed by call site
//!
//! [`Cache::resolve`] returns the cached value for a call site when one is
//! stored, and otherwise runs the producer and stores its result:
//!
//! - No backend configured: the producer runs, nothing is read or written.
//! - Entry cannot be decoded, or a fresh value cannot be encoded: the key is
//!   deleted from the primary and the producer runs again, uncached.
//! - Any store failure: the producer's value is returned, nothing is purged.
//!
//! No error ever reaches the caller. Concurrent misses on one key all run the
//! producer and the last write wins.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::codec::{Codec, JsonCodec};
use crate::config::{CacheConfig, expiry_seconds};
use crate::error::CacheError;
use crate::key::{CallSite, Prefix, build_key, canonical_discriminator};
use crate::topology::{Backend, BackendTopology, StoreHandle};

static GLOBAL: OnceLock<Cache> = OnceLock::new();

/// Per-call overrides for [`Cache::resolve`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    discriminator: Option<String>,
    ttl: Option<Duration>,
    prefix: Option<Prefix>,
    receiver: Option<&'static str>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Separate entries for different inputs at the same call site.
    pub fn key<D: fmt::Debug + ?Sized>(mut self, discriminator: &D) -> Self {
        self.discriminator = Some(canonical_discriminator(discriminator));
        self
    }

    /// Expiry for the entry; `Duration::ZERO` stores it without expiry and
    /// fractions of a second round up.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<Prefix>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Receiver type named by [`Prefix::ReceiverType`].
    pub fn receiver<T: ?Sized>(mut self) -> Self {
        self.receiver = Some(std::any::type_name::<T>());
        self
    }

    pub fn receiver_of<T: ?Sized>(self, _receiver: &T) -> Self {
        self.receiver::<T>()
    }

    fn build_key(&self, site: &CallSite, default_prefix: &Prefix) -> String {
        build_key(
            self.discriminator.as_deref(),
            self.prefix.as_ref().unwrap_or(default_prefix),
            site,
            self.receiver,
        )
    }
}

/// Read-through cache over a configurable backend.
///
/// Clones share configuration. Configuration changes apply to calls that
/// start after the change.
pub struct Cache<C: Codec = JsonCodec> {
    config: Arc<RwLock<CacheConfig>>,
    codec: Arc<C>,
}

impl<C: Codec> Clone for Cache<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }

    /// Process-wide instance, bypassed until a backend is set.
    pub fn global() -> &'static Cache {
        GLOBAL.get_or_init(Cache::default)
    }
}

impl<C: Codec> Cache<C> {
    pub fn with_codec(config: CacheConfig, codec: C) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            codec: Arc::new(codec),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> CacheConfig {
        self.config.read().clone()
    }

    pub fn set_backend(&self, backend: Option<Backend>) {
        debug!("Cache backend set to {:?}", backend);
        self.config.write().backend = backend;
    }

    pub fn set_default_ttl(&self, ttl: Option<Duration>) {
        self.config.write().default_ttl = ttl;
    }

    pub fn set_default_prefix(&self, prefix: impl Into<Prefix>) {
        self.config.write().default_prefix = prefix.into();
    }

    fn topology(&self) -> BackendTopology {
        BackendTopology::new(self.config.read().backend.clone())
    }

    /// The key a call at `site` with `options` would use, or `None` when no
    /// backend is configured.
    pub fn key_for(&self, site: &CallSite, options: &FetchOptions) -> Option<String> {
        let config = self.config();
        config.backend.as_ref()?;
        Some(options.build_key(site, &config.default_prefix))
    }

    /// [`resolve`](Self::resolve) with the caller's source location as the
    /// call site.
    #[track_caller]
    pub fn fetch<V, F, Fut>(&self, options: FetchOptions, producer: F) -> impl Future<Output = V>
    where
        V: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = V>,
    {
        let site = CallSite::caller();
        self.resolve(site, options, producer)
    }

    /// Return the value cached for `site`, computing and storing it with
    /// `producer` on a miss.
    ///
    /// `producer` runs at most once, except after a serialization fault where
    /// it runs once more to produce the uncached result.
    pub async fn resolve<V, F, Fut>(
        &self,
        site: CallSite,
        options: FetchOptions,
        mut producer: F,
    ) -> V
    where
        V: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = V>,
    {
        let config = self.config();
        let topology = BackendTopology::new(config.backend);
        let (Some(primary), Some(replica)) = (topology.primary(), topology.replica()) else {
            debug!("Cache bypassed at {}: no backend configured", site);
            return producer().await;
        };

        let key = options.build_key(&site, &config.default_prefix);
        let ttl = options.ttl.or(config.default_ttl);

        match self
            .read_through(&primary, &replica, &key, ttl, &mut producer)
            .await
        {
            Ok(value) => value,
            Err(CacheError::Serialization(e)) => {
                warn!(
                    "Unserializable cache entry for key {} ({}). Deleting and recomputing.",
                    key, e
                );
                if let Err(del_err) = primary.del(&key).await {
                    warn!(
                        "Failed to delete unserializable entry for key {} on {}: {}",
                        key,
                        primary.name(),
                        del_err
                    );
                }
                producer().await
            }
            Err(e) => {
                warn!(
                    "Cache read for key {} failed ({}). Falling back to producer.",
                    key, e
                );
                producer().await
            }
        }
    }

    async fn read_through<V, F, Fut>(
        &self,
        primary: &StoreHandle,
        replica: &StoreHandle,
        key: &str,
        ttl: Option<Duration>,
        producer: &mut F,
    ) -> Result<V, CacheError>
    where
        V: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(bytes) = replica.get(key).await? {
            debug!("Cache hit for key: {}", key);
            return Ok(self.codec.decode(&bytes)?);
        }

        debug!("Cache miss for key: {}", key);
        let value = producer().await;

        match self.update(primary, key, &value, ttl).await {
            Ok(()) => Ok(value),
            Err(e @ CacheError::Serialization(_)) => Err(e),
            Err(e) => {
                warn!(
                    "Cache write for key {} on {} failed: {}. Continuing.",
                    key,
                    primary.name(),
                    e
                );
                Ok(value)
            }
        }
    }

    async fn update<V: Serialize>(
        &self,
        primary: &StoreHandle,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes = self.codec.encode(value)?;
        match expiry_seconds(ttl) {
            Some(seconds) => primary.set_ex(key, bytes, seconds).await?,
            None => primary.set(key, bytes).await?,
        }
        Ok(())
    }

    /// Whether `key` is stored, as seen by a replica. `false` on any error.
    pub async fn exists(&self, key: &str) -> bool {
        let Some(replica) = self.topology().replica() else {
            return false;
        };
        match replica.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("EXISTS for key {} on {} failed: {}", key, replica.name(), e);
                false
            }
        }
    }

    /// Delete `key` from the primary if a replica reports it present.
    /// Returns whether a deletion happened.
    pub async fn delete(&self, key: &str) -> bool {
        let topology = self.topology();
        let (Some(primary), Some(replica)) = (topology.primary(), topology.replica()) else {
            return false;
        };

        match replica.exists(key).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("EXISTS for key {} on {} failed: {}", key, replica.name(), e);
                return false;
            }
        }

        match primary.del(key).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("DEL for key {} on {} failed: {}", key, primary.name(), e);
                false
            }
        }
    }

    /// Keys on the primary matching a glob pattern, e.g. `"balance_*"`.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        match self.topology().primary() {
            Some(primary) => Ok(primary.keys(pattern).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Delete every primary key matching a glob pattern. Returns how many
    /// were removed.
    pub async fn purge(&self, pattern: &str) -> Result<usize, CacheError> {
        let Some(primary) = self.topology().primary() else {
            return Ok(0);
        };

        let keys = primary.keys(pattern).await?;
        debug!("Purging {} keys matching {}", keys.len(), pattern);

        let mut removed = 0;
        for result in join_all(keys.iter().map(|key| primary.del(key))).await {
            if result? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
