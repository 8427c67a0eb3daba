//! Binding laws to store keys.
//!
//! A [`LawRegistry`] keeps, per store key, the laws in first-registration
//! order. Registering the same `(store key, law name)` twice is a no-op.
//!
//! # Example
//!
//! ```rust
//! use causa_core::StoreRegistry;
//! use causa_laws::{define_law, FnConstraint, LawOptions, LawRegistry};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let stores: StoreRegistry<i64> = StoreRegistry::new();
//! let prey = stores.create_store("prey", 50).unwrap();
//!
//! let laws = LawRegistry::new();
//! laws.register(
//!     "prey",
//!     define_law(
//!         "non-negative",
//!         FnConstraint::predicate("prey >= 0", |v: &i64| *v >= 0).with_repair(|_| 0),
//!         LawOptions::new(),
//!     ),
//! );
//!
//! let write = laws.govern_set(&prey, -5, Some(&stores)).await;
//! assert!(write.repair_event_id.is_some());
//! assert_eq!(prey.lock().get(), 0);
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use causa_core::{CausalEvent, EventSource, StateValue, StoreHandle, WriteOptions};

use crate::execute::{execute_law, ExecuteOptions, LawExecution, ReactionContext};
use crate::law::UniverseLaw;

/// Options for [`LawRegistry::execute_all`].
pub struct GovernOptions<'a, T> {
    pub event: Option<&'a CausalEvent<T>>,
    pub attempt_repair: bool,
    pub context: Option<&'a dyn ReactionContext>,
    pub apply_reactions: bool,
}

impl<T> Default for GovernOptions<'_, T> {
    fn default() -> Self {
        Self {
            event: None,
            attempt_repair: true,
            context: None,
            apply_reactions: true,
        }
    }
}

/// Outcome of [`LawRegistry::govern_set`].
#[derive(Debug, Clone)]
pub struct GovernedWrite<T> {
    /// The caller's write.
    pub event_id: String,
    /// `law-repair` write, when the laws changed the value.
    pub repair_event_id: Option<String>,
    /// Value the store holds afterwards.
    pub value: T,
    pub executions: Vec<LawExecution<T>>,
}

impl<T> GovernedWrite<T> {
    /// True when every law holds for the final value.
    pub fn lawful(&self) -> bool {
        self.executions.iter().all(|e| e.satisfied())
    }
}

/// Store key to ordered laws.
pub struct LawRegistry<T> {
    laws: RwLock<BTreeMap<String, Vec<Arc<UniverseLaw<T>>>>>,
}

impl<T: StateValue> Default for LawRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StateValue> LawRegistry<T> {
    pub fn new() -> Self {
        Self {
            laws: RwLock::new(BTreeMap::new()),
        }
    }

    /// Binds `law` to `store_key`. Returns false if a law of that name is
    /// already bound there.
    pub fn register(&self, store_key: &str, law: Arc<UniverseLaw<T>>) -> bool {
        let mut laws = self.laws.write();
        let bound = laws.entry(store_key.to_string()).or_default();
        if bound.iter().any(|l| l.name() == law.name()) {
            debug!("Law '{}' already bound to '{}'", law.name(), store_key);
            return false;
        }
        debug!("Bound law '{}' to '{}'", law.name(), store_key);
        bound.push(law);
        true
    }

    /// Removes a law by name. Returns whether one was removed.
    pub fn unregister(&self, store_key: &str, law_name: &str) -> bool {
        let mut laws = self.laws.write();
        let Some(bound) = laws.get_mut(store_key) else {
            return false;
        };
        let before = bound.len();
        bound.retain(|l| l.name() != law_name);
        let removed = bound.len() != before;
        if bound.is_empty() {
            laws.remove(store_key);
        }
        removed
    }

    /// Laws bound to `store_key`, in registration order.
    pub fn laws_for(&self, store_key: &str) -> Vec<Arc<UniverseLaw<T>>> {
        self.laws.read().get(store_key).cloned().unwrap_or_default()
    }

    /// Store keys with at least one law.
    pub fn store_keys(&self) -> Vec<String> {
        self.laws.read().keys().cloned().collect()
    }

    /// Total number of bindings.
    pub fn len(&self) -> usize {
        self.laws.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every law bound to `store_key` in order. Each law sees the
    /// previous law's effective state.
    pub async fn execute_all(
        &self,
        store_key: &str,
        state: T,
        options: GovernOptions<'_, T>,
    ) -> Vec<LawExecution<T>> {
        let laws = self.laws_for(store_key);
        let mut executions = Vec::with_capacity(laws.len());
        let mut current = state;

        for law in &laws {
            let execution = execute_law(
                law,
                ExecuteOptions {
                    state: current.clone(),
                    store_key,
                    event: options.event,
                    attempt_repair: options.attempt_repair,
                    context: options.context,
                    apply_reactions: options.apply_reactions,
                },
            )
            .await;
            current = execution.effective_state.clone();
            executions.push(execution);
        }

        executions
    }

    /// Writes `value` to the store and lets its laws govern the result.
    ///
    /// The write is recorded first. The bound laws then run with repair and
    /// reactions enabled. If they produce a different value it is recorded
    /// as a `law-repair` write caused by the original one. The store lock is
    /// never held while laws run.
    pub async fn govern_set(
        &self,
        handle: &StoreHandle<T>,
        value: T,
        context: Option<&dyn ReactionContext>,
    ) -> GovernedWrite<T> {
        let (store_key, event_id, event) = {
            let mut store = handle.lock();
            let id = store.set_with(value.clone(), WriteOptions::from_source(EventSource::Set));
            let event = store.at_event(&id).cloned();
            (store.key().to_string(), id, event)
        };

        let executions = self
            .execute_all(
                &store_key,
                value.clone(),
                GovernOptions {
                    event: event.as_ref(),
                    context,
                    ..GovernOptions::default()
                },
            )
            .await;

        let governed = executions
            .last()
            .map(|e| e.effective_state.clone())
            .unwrap_or_else(|| value.clone());

        let repair_event_id = if governed != value {
            let laws: Vec<&str> = executions
                .iter()
                .filter(|e| e.repaired.is_some())
                .map(|e| e.law.as_str())
                .collect();
            let mut options = WriteOptions::from_source(EventSource::LawRepair);
            options.metadata = options.metadata.with_tag("laws", laws.join(","));
            let id = handle.lock().set_with(governed.clone(), options);
            info!("Laws [{}] repaired '{}' with event {}", laws.join(", "), store_key, id);
            Some(id)
        } else {
            None
        };

        GovernedWrite {
            event_id,
            repair_event_id,
            value: governed,
            executions,
        }
    }
}
