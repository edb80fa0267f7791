/// Registry of established connections, keyed by endpoint identity
use fnv::FnvHashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type Slot<C> = Arc<Mutex<Option<Arc<C>>>>;

/// Owned store of reusable connections.
///
/// Each identity gets its own slot lock, so the check-connect-store sequence
/// for one endpoint is serialized while different endpoints connect in
/// parallel. Entries are only written after a clean connect and stay until
/// they are evicted or the registry is drained.
pub struct ConnectionRegistry<C> {
    slots: RwLock<FnvHashMap<String, Slot<C>>>,
}

/// Exclusive access to one identity's registry entry
pub struct SlotGuard<C> {
    guard: OwnedMutexGuard<Option<Arc<C>>>,
}

impl<C> SlotGuard<C> {
    /// The cached connection, if any
    pub fn cached(&self) -> Option<Arc<C>> {
        self.guard.as_ref().map(Arc::clone)
    }

    /// Store a freshly established connection and hand back the shared handle
    pub fn store(&mut self, connection: C) -> Arc<C> {
        let connection = Arc::new(connection);
        *self.guard = Some(Arc::clone(&connection));
        connection
    }

    /// Remove the cached connection
    pub fn take(&mut self) -> Option<Arc<C>> {
        self.guard.take()
    }
}

impl<C> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(FnvHashMap::default()),
        }
    }

    async fn slot(&self, identity: &str) -> Slot<C> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(identity) {
                return Arc::clone(slot);
            }
        }

        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(identity.to_string()).or_default())
    }

    async fn existing_slot(&self, identity: &str) -> Option<Slot<C>> {
        self.slots.read().await.get(identity).map(Arc::clone)
    }

    /// Lock the entry for `identity`, waiting for any in-flight connect to it
    pub async fn lock(&self, identity: &str) -> SlotGuard<C> {
        let slot = self.slot(identity).await;
        SlotGuard {
            guard: slot.lock_owned().await,
        }
    }

    /// Get the cached connection for an identity
    pub async fn get(&self, identity: &str) -> Option<Arc<C>> {
        let slot = self.existing_slot(identity).await?;
        let cached = slot.lock().await.as_ref().map(Arc::clone);
        cached
    }

    /// Remove and return the cached connection for an identity
    pub async fn evict(&self, identity: &str) -> Option<Arc<C>> {
        let slot = self.existing_slot(identity).await?;
        let evicted = slot.lock().await.take();
        evicted
    }

    /// Identities that currently hold a connection, sorted
    pub async fn identities(&self) -> Vec<String> {
        let slots: Vec<(String, Slot<C>)> = {
            let slots = self.slots.read().await;
            slots
                .iter()
                .map(|(identity, slot)| (identity.clone(), Arc::clone(slot)))
                .collect()
        };

        let mut identities = Vec::new();
        for (identity, slot) in slots {
            if slot.lock().await.is_some() {
                identities.push(identity);
            }
        }
        identities.sort();
        identities
    }

    /// Number of cached connections
    pub async fn len(&self) -> usize {
        self.identities().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every cached connection and return them
    pub async fn drain(&self) -> Vec<(String, Arc<C>)> {
        let slots: Vec<(String, Slot<C>)> = {
            let mut slots = self.slots.write().await;
            slots.drain().collect()
        };

        let mut drained = Vec::new();
        for (identity, slot) in slots {
            if let Some(connection) = slot.lock().await.take() {
                drained.push((identity, connection));
            }
        }
        drained
    }
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
