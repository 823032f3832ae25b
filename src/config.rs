//! Cache configuration

use std::time::Duration;

use crate::key::Prefix;
use crate::topology::Backend;

/// Defaults applied to every fetch that does not override them.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Expiry for new entries. `None` or zero persists them; a fraction of a
    /// second rounds up to whole seconds.
    pub default_ttl: Option<Duration>,
    /// Prefix strategy for derived keys
    pub default_prefix: Prefix,
    /// Where entries live. `None` bypasses caching entirely.
    pub backend: Option<Backend>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_default_prefix(mut self, prefix: impl Into<Prefix>) -> Self {
        self.default_prefix = prefix.into();
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }
}

/// Whole seconds to expire after, rounded up, or `None` to persist
/// indefinitely.
pub(crate) fn expiry_seconds(ttl: Option<Duration>) -> Option<u64> {
    let ttl = ttl.filter(|ttl| !ttl.is_zero())?;
    let partial = u64::from(ttl.subsec_nanos() > 0);
    Some(ttl.as_secs().saturating_add(partial))
}
