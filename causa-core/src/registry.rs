//! Explicit store registry.
//!
//! Each run (or test) owns its own `StoreRegistry` and passes it to
//! whoever needs stores; there is no process-wide store factory.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{CausalError, Result};
use crate::event::StateValue;
use crate::store::{CausalStore, StoreOptions};

/// Shared handle to a causal store.
pub type StoreHandle<T> = Arc<Mutex<CausalStore<T>>>;

/// Typed map from store key to causal store.
pub struct StoreRegistry<T> {
    stores: RwLock<BTreeMap<String, StoreHandle<T>>>,
    options: StoreOptions,
}

impl<T: StateValue> Default for StoreRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StateValue> StoreRegistry<T> {
    /// Registry whose stores use the wall clock.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Registry whose stores are all created with `options`.
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            stores: RwLock::new(BTreeMap::new()),
            options,
        }
    }

    /// Creates and registers a store seeded with `initial`.
    ///
    /// # Errors
    /// `DuplicateStore` if the key is taken.
    pub fn create_store(&self, key: &str, initial: T) -> Result<StoreHandle<T>> {
        let mut stores = self.stores.write();
        if stores.contains_key(key) {
            return Err(CausalError::DuplicateStore(key.to_string()));
        }
        let handle = Arc::new(Mutex::new(CausalStore::with_options(
            key,
            initial,
            self.options.clone(),
        )));
        stores.insert(key.to_string(), Arc::clone(&handle));
        debug!("Registered store '{}'", key);
        Ok(handle)
    }

    /// Handle of a registered store.
    pub fn get(&self, key: &str) -> Option<StoreHandle<T>> {
        self.stores.read().get(key).cloned()
    }

    /// Handle of a registered store.
    ///
    /// # Errors
    /// `UnknownStore` if nothing is registered under `key`.
    pub fn require(&self, key: &str) -> Result<StoreHandle<T>> {
        self.get(key)
            .ok_or_else(|| CausalError::UnknownStore(key.to_string()))
    }

    /// True when a store is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.stores.read().contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.stores.read().keys().cloned().collect()
    }

    /// Number of registered stores.
    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    /// True when no store is registered.
    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}
