//! Primary/replica routing
//!
//! Writes and deletes go to the primary. Reads go to a replica picked at
//! random per call; with no replicas configured the primary serves reads too.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::store::Store;

/// Shared handle to a store.
pub type StoreHandle = Arc<dyn Store>;

/// A configured cache backend.
#[derive(Clone)]
pub enum Backend {
    /// One store serving reads and writes.
    Single(StoreHandle),
    /// Writes to `primary`, reads from one of `replicas`.
    Replicated {
        primary: StoreHandle,
        replicas: Vec<StoreHandle>,
    },
}

impl Backend {
    pub fn single(store: impl Store) -> Self {
        Backend::Single(Arc::new(store))
    }

    pub fn replicated(primary: impl Store, replicas: Vec<StoreHandle>) -> Self {
        Backend::Replicated {
            primary: Arc::new(primary),
            replicas,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Single(store) => f.debug_tuple("Single").field(&store.name()).finish(),
            Backend::Replicated { primary, replicas } => f
                .debug_struct("Replicated")
                .field("primary", &primary.name())
                .field(
                    "replicas",
                    &replicas.iter().map(|r| r.name()).collect::<Vec<_>>(),
                )
                .finish(),
        }
    }
}

/// Resolves a (possibly absent) backend into store handles.
#[derive(Debug, Clone, Default)]
pub struct BackendTopology {
    backend: Option<Backend>,
}

impl BackendTopology {
    pub fn new(backend: Option<Backend>) -> Self {
        Self { backend }
    }

    /// Target for writes and deletes.
    pub fn primary(&self) -> Option<StoreHandle> {
        match self.backend.as_ref()? {
            Backend::Single(store) => Some(Arc::clone(store)),
            Backend::Replicated { primary, .. } => Some(Arc::clone(primary)),
        }
    }

    /// Target for reads, chosen independently on every call.
    pub fn replica(&self) -> Option<StoreHandle> {
        match self.backend.as_ref()? {
            Backend::Single(store) => Some(Arc::clone(store)),
            Backend::Replicated { primary, replicas } => replicas
                .choose(&mut rand::thread_rng())
                .or(Some(primary))
                .map(Arc::clone),
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.backend.is_none()
    }
}

impl From<Option<Backend>> for BackendTopology {
    fn from(backend: Option<Backend>) -> Self {
        Self::new(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    fn same(a: &StoreHandle, b: &StoreHandle) -> bool {
        Arc::ptr_eq(a, b)
    }

    #[test]
    fn test_unconfigured_backend_is_bypassed() {
        let topology = BackendTopology::default();
        assert!(topology.is_bypassed());
        assert!(topology.primary().is_none());
        assert!(topology.replica().is_none());
    }

    #[test]
    fn test_single_store_is_primary_and_replica() {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        let topology = BackendTopology::new(Some(Backend::Single(Arc::clone(&store))));
        assert!(same(&topology.primary().unwrap(), &store));
        assert!(same(&topology.replica().unwrap(), &store));
    }

    #[test]
    fn test_empty_replica_set_reads_from_primary() {
        let primary: StoreHandle = Arc::new(MemoryStore::new());
        let topology = BackendTopology::new(Some(Backend::Replicated {
            primary: Arc::clone(&primary),
            replicas: Vec::new(),
        }));
        assert!(same(&topology.replica().unwrap(), &primary));
    }

    #[test]
    fn test_reads_spread_across_replicas_never_primary() {
        let primary: StoreHandle = Arc::new(MemoryStore::new());
        let replicas: Vec<StoreHandle> = (0..3)
            .map(|_| Arc::new(MemoryStore::new()) as StoreHandle)
            .collect();
        let topology = BackendTopology::new(Some(Backend::Replicated {
            primary: Arc::clone(&primary),
            replicas: replicas.clone(),
        }));

        assert!(same(&topology.primary().unwrap(), &primary));

        let mut seen = HashSet::new();
        for _ in 0..300 {
            let replica = topology.replica().unwrap();
            assert!(!same(&replica, &primary));
            let index = replicas.iter().position(|r| same(r, &replica)).unwrap();
            seen.insert(index);
        }
        assert_eq!(seen.len(), 3);
    }
}
