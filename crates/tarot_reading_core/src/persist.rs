//! crates/tarot_reading_core/src/persist.rs
//!
//! The explicit persistence step shared by both stores. A store mutates its
//! state in memory, then `PersistentStore` serializes the whole partition to
//! the `StateStorage` port. Loading does the reverse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::ports::{PortError, PortResult, StateStorage};

/// Partition holding the reading session.
pub const READING_PARTITION: &str = "tarot-storage";
/// Partition holding the user identity.
pub const USER_PARTITION: &str = "user-storage";
/// Raw bearer token slot, read directly by the HTTP adapter.
pub const TOKEN_KEY: &str = "token";

/// State that knows how to live in one storage partition.
pub trait PersistentState: Default + Sized {
    const PARTITION: &'static str;

    fn encode(&self) -> serde_json::Result<String>;

    fn decode(raw: &str) -> serde_json::Result<Self>;

    /// Writes any slots that live outside the main partition.
    fn sync_side_slots(&self, _storage: &dyn StateStorage) -> PortResult<()> {
        Ok(())
    }
}

/// A state container that saves itself after every update.
pub struct PersistentStore<S> {
    state: S,
    storage: Arc<dyn StateStorage>,
}

impl<S: PersistentState> PersistentStore<S> {
    /// Rehydrates from storage. A missing partition yields the default state;
    /// an unreadable one is logged and also yields the default.
    pub fn load(storage: Arc<dyn StateStorage>) -> Self {
        let state = match storage.get(S::PARTITION) {
            Ok(Some(raw)) => S::decode(&raw).unwrap_or_else(|e| {
                warn!(partition = S::PARTITION, "Discarding unreadable partition: {}", e);
                S::default()
            }),
            Ok(None) => S::default(),
            Err(e) => {
                warn!(partition = S::PARTITION, "Failed to read partition: {}", e);
                S::default()
            }
        };
        Self { state, storage }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Applies `f` to the state, then persists.
    ///
    /// A failed save is logged and does not undo the in-memory change.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut S) -> R) -> R {
        let out = f(&mut self.state);
        if let Err(e) = self.persist() {
            warn!(partition = S::PARTITION, "Failed to persist state: {}", e);
        }
        out
    }

    /// Serializes the current state to storage.
    pub fn persist(&self) -> PortResult<()> {
        let raw = self
            .state
            .encode()
            .map_err(|e| PortError::Storage(e.to_string()))?;
        self.storage.set(S::PARTITION, &raw)?;
        self.state.sync_side_slots(self.storage.as_ref())?;
        debug!(partition = S::PARTITION, "State persisted.");
        Ok(())
    }
}

//=========================================================================================
// In-Memory Storage
//=========================================================================================

/// A `StateStorage` that lives only as long as the process. It also keeps a
/// log of every write, in order.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(key, value)` passed to `set`, oldest first.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Writes made to one key, oldest first.
    pub fn writes_to(&self, key: &str) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }
}

fn poisoned<T>(_: T) -> PortError {
    PortError::Storage("storage lock poisoned".to_string())
}

impl StateStorage for MemoryStorage {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        self.writes
            .lock()
            .map_err(poisoned)?
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u32,
    }

    impl PersistentState for Counter {
        const PARTITION: &'static str = "counter";

        fn encode(&self) -> serde_json::Result<String> {
            serde_json::to_string(self)
        }

        fn decode(raw: &str) -> serde_json::Result<Self> {
            serde_json::from_str(raw)
        }
    }

    #[test]
    fn update_persists_after_every_mutation() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = PersistentStore::<Counter>::load(storage.clone());
        store.update(|c| c.value += 1);
        store.update(|c| c.value += 1);

        assert_eq!(
            storage.writes_to("counter"),
            vec![r#"{"value":1}"#.to_string(), r#"{"value":2}"#.to_string()]
        );
    }

    #[test]
    fn load_rehydrates_saved_partition() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("counter", r#"{"value":7}"#).unwrap();
        let store = PersistentStore::<Counter>::load(storage);
        assert_eq!(store.state(), &Counter { value: 7 });
    }

    #[test]
    fn load_falls_back_to_default_on_garbage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("counter", "not json").unwrap();
        let store = PersistentStore::<Counter>::load(storage);
        assert_eq!(store.state(), &Counter::default());
    }
}
