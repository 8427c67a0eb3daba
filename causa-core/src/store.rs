//! Causal store: a base cell that remembers how it got where it is.
//!
//! `CausalStore` wraps a [`MemoryCell`] and records every mutation as a
//! [`CausalEvent`]. One append-only log holds the events of every universe
//! (branch); a universe is only a partition key over that log. On top of
//! the log the store offers time travel, branching, merging and switching.
//!
//! # Example
//!
//! ```rust
//! use causa_core::{BranchOptions, CausalStore, MergeStrategy};
//!
//! let mut store = CausalStore::new("score", 25i64);
//! let experiment = store.branch("experiment", BranchOptions::default()).unwrap();
//!
//! store.switch_branch(&experiment).unwrap();
//! store.set(100);
//! store.switch_branch("main").unwrap();
//! assert_eq!(store.get(), 25);
//!
//! let merged = store.merge(&experiment, MergeStrategy::Theirs).unwrap();
//! assert!(merged.success);
//! assert_eq!(store.get(), 100);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cell::{Listener, MemoryCell, SubscriptionId};
use crate::clock::{Clock, SystemClock};
use crate::error::{CausalError, Result};
use crate::event::{
    create_causal_event, validate_history, CausalEvent, EventMetadata, EventOptions, EventSource,
    EventType, StateValue, MAIN_UNIVERSE,
};
use crate::graph::{
    build_causal_graph, calculate_causal_stats, find_ancestors, find_descendants, query_events,
    CausalGraph, EventQuery,
};

/// Construction options for a [`CausalStore`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Default observer stamped on events written through this store.
    pub observer_id: Option<String>,
    /// Timestamp source.
    pub clock: Arc<dyn Clock>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            observer_id: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl StoreOptions {
    /// Options using the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }
}

/// Provenance for a single write.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub metadata: EventMetadata,
    /// Overrides the store's default observer for this write.
    pub observer_id: Option<String>,
}

impl WriteOptions {
    /// Write tagged with a source.
    pub fn from_source(source: EventSource) -> Self {
        Self {
            metadata: EventMetadata::from_source(source),
            observer_id: None,
        }
    }
}

/// A timeline of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub parent_universe: Option<String>,
    /// Event the universe was forked from.
    pub fork_point: Option<String>,
    pub created_at: u64,
    pub last_event_timestamp: u64,
}

/// Where a new universe starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForkPoint {
    /// Latest event of the current universe.
    #[default]
    Latest,
    /// A specific event id.
    Event(String),
    /// Latest event of the current universe at or before this time.
    Timestamp(u64),
}

/// Options for [`CausalStore::branch`].
#[derive(Debug, Clone, Default)]
pub struct BranchOptions {
    pub fork_point: ForkPoint,
    pub observer_id: Option<String>,
}

/// How [`CausalStore::merge`] resolves differing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Keep the current universe's value.
    Ours,
    /// Adopt the source universe's value.
    Theirs,
    /// Whichever side wrote last; ties keep ours.
    LastWrite,
    /// Report conflicts and change nothing.
    Manual,
}

impl MergeStrategy {
    fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Ours => "ours",
            MergeStrategy::Theirs => "theirs",
            MergeStrategy::LastWrite => "last-write",
            MergeStrategy::Manual => "manual",
        }
    }
}

/// One unresolved difference found by a `manual` merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeConflict<T> {
    /// Last event of the source universe.
    pub event_id: String,
    pub ours: T,
    pub theirs: T,
}

/// Outcome of a merge. Conflicts are a result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult<T> {
    pub success: bool,
    /// Value of the current universe after the merge.
    pub merged_value: Option<T>,
    /// Merge node, if one was recorded.
    pub event_id: Option<String>,
    pub conflicts: Vec<MergeConflict<T>>,
}

/// Summary of a store's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub store_key: String,
    pub total_events: usize,
    pub universes: usize,
    pub current_universe: String,
    pub events_in_current_universe: usize,
    pub max_depth: usize,
    pub avg_branching_factor: f64,
    pub merge_nodes: usize,
    pub first_timestamp: u64,
    pub last_timestamp: u64,
}

/// Event-sourced wrapper around a [`MemoryCell`].
///
/// Writes take `&mut self`: a store has exactly one writer at a time.
/// Share it through a [`crate::StoreHandle`] when several components need it.
pub struct CausalStore<T> {
    key: String,
    cell: MemoryCell<T>,
    history: Vec<CausalEvent<T>>,
    current_universe: String,
    branches: BTreeMap<String, Branch>,
    graph: OnceLock<CausalGraph<T>>,
    observer_id: Option<String>,
    clock: Arc<dyn Clock>,
}

impl<T: StateValue> CausalStore<T> {
    /// Creates a store seeded with `initial` using the wall clock.
    pub fn new(key: impl Into<String>, initial: T) -> Self {
        Self::with_options(key, initial, StoreOptions::default())
    }

    /// Creates a store seeded with `initial`.
    ///
    /// Records the implicit `create` event in the main universe.
    pub fn with_options(key: impl Into<String>, initial: T, options: StoreOptions) -> Self {
        let key = key.into();
        let seed = create_causal_event(
            &key,
            EventType::Create,
            initial.clone(),
            EventOptions {
                observer_id: options.observer_id.clone(),
                metadata: EventMetadata::from_source(EventSource::Create),
                ..EventOptions::default()
            },
            options.clock.as_ref(),
        );

        let mut branches = BTreeMap::new();
        branches.insert(
            MAIN_UNIVERSE.to_string(),
            Branch {
                id: MAIN_UNIVERSE.to_string(),
                name: MAIN_UNIVERSE.to_string(),
                parent_universe: None,
                fork_point: None,
                created_at: seed.timestamp,
                last_event_timestamp: seed.timestamp,
            },
        );

        debug!("Created causal store '{}'", key);

        Self {
            key,
            cell: MemoryCell::new(initial),
            history: vec![seed],
            current_universe: MAIN_UNIVERSE.to_string(),
            branches,
            graph: OnceLock::new(),
            observer_id: options.observer_id,
            clock: options.clock,
        }
    }

    /// Store key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value of the base cell.
    pub fn get(&self) -> T {
        self.cell.get()
    }

    /// Handle to the base cell (shares state with the store).
    pub fn cell(&self) -> MemoryCell<T> {
        self.cell.clone()
    }

    /// Subscribes to value changes of the base cell.
    pub fn subscribe(&self, listener: Listener<T>) -> Result<SubscriptionId> {
        self.cell.subscribe(listener)
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.cell.unsubscribe(id)
    }

    /// Universe writes currently go to.
    pub fn current_universe(&self) -> &str {
        &self.current_universe
    }

    /// Full log, all universes, in append order.
    pub fn history(&self) -> &[CausalEvent<T>] {
        &self.history
    }

    /// Causal graph of the log, rebuilt on first use after a write.
    pub fn graph(&self) -> &CausalGraph<T> {
        self.graph.get_or_init(|| build_causal_graph(&self.history))
    }

    /// Records an `update` event and forwards the value to the base cell.
    ///
    /// Returns the new event id.
    pub fn set(&mut self, value: T) -> String {
        self.set_with(value, WriteOptions::default())
    }

    /// Like [`set`](Self::set) with explicit provenance.
    pub fn set_with(&mut self, value: T, options: WriteOptions) -> String {
        let parent = self.last_event_in(&self.current_universe).map(|e| e.id.clone());
        let id = self.append(
            EventType::Update,
            value.clone(),
            parent.into_iter().collect(),
            options.metadata,
            options.observer_id,
        );
        self.cell.set(value);
        id
    }

    /// Returns to the very first recorded value (the original seed).
    pub fn reset(&mut self) -> String {
        let seed = self.history[0].value.clone();
        let parent = self.last_event_in(&self.current_universe).map(|e| e.id.clone());
        let id = self.append(
            EventType::Reset,
            seed.clone(),
            parent.into_iter().collect(),
            EventMetadata::from_source(EventSource::Reset),
            None,
        );
        self.cell.set(seed);
        id
    }

    /// Value of the latest current-universe event with `timestamp <= at`.
    pub fn at(&self, at: u64) -> Option<T> {
        self.graph()
            .latest_at(&self.current_universe, at)
            .map(|e| e.value.clone())
    }

    /// Looks up any recorded event by id, whatever its universe.
    pub fn at_event(&self, id: &str) -> Option<&CausalEvent<T>> {
        self.graph().get(id)
    }

    /// Current-universe events in the inclusive range, ordered by time.
    pub fn between(&self, start: u64, end: u64) -> Vec<&CausalEvent<T>> {
        self.query(&EventQuery::between(start, end))
    }

    /// Full causal ancestry of an event, across universes.
    pub fn caused_by(&self, id: &str) -> Result<Vec<&CausalEvent<T>>> {
        find_ancestors(self.graph(), id)
    }

    /// Every event that depends on the given one, across universes.
    pub fn effects_of(&self, id: &str) -> Result<Vec<&CausalEvent<T>>> {
        find_descendants(self.graph(), id)
    }

    /// Runs a query, limited to the current universe unless it names universes.
    pub fn query(&self, query: &EventQuery) -> Vec<&CausalEvent<T>> {
        if query.universe_ids.is_some() {
            return query_events(self.graph(), query);
        }
        let scoped = EventQuery {
            universe_ids: Some(vec![self.current_universe.clone()]),
            ..query.clone()
        };
        query_events(self.graph(), &scoped)
    }

    /// Forks a new universe and returns its id.
    ///
    /// The new universe starts with a synthetic `create` event carrying the
    /// fork point's value and pointing back at it. The current universe
    /// does not change.
    ///
    /// # Errors
    /// `UnknownEvent` for an explicit id that is not recorded,
    /// `NoForkPoint` when nothing resolves.
    pub fn branch(&mut self, name: &str, options: BranchOptions) -> Result<String> {
        let fork = match &options.fork_point {
            ForkPoint::Latest => self.last_event_in(&self.current_universe).cloned(),
            ForkPoint::Event(id) => Some(
                self.history
                    .iter()
                    .find(|e| &e.id == id)
                    .cloned()
                    .ok_or_else(|| CausalError::UnknownEvent(id.clone()))?,
            ),
            ForkPoint::Timestamp(t) => self.graph().latest_at(&self.current_universe, *t).cloned(),
        }
        .ok_or_else(|| {
            CausalError::NoForkPoint(format!(
                "{:?} in universe '{}' of store '{}'",
                options.fork_point, self.current_universe, self.key
            ))
        })?;

        let universe_id = format!("u-{}", Uuid::new_v4());
        let metadata = EventMetadata {
            source: EventSource::Branch,
            branch_name: Some(name.to_string()),
            ..EventMetadata::default()
        };
        let event = create_causal_event(
            &self.key,
            EventType::Create,
            fork.value.clone(),
            EventOptions {
                previous_value: None,
                caused_by: vec![fork.id.clone()],
                universe_id: universe_id.clone(),
                observer_id: options.observer_id.or_else(|| self.observer_id.clone()),
                metadata,
                timestamp: Some(self.next_timestamp()),
            },
            self.clock.as_ref(),
        );

        self.branches.insert(
            universe_id.clone(),
            Branch {
                id: universe_id.clone(),
                name: name.to_string(),
                parent_universe: Some(fork.universe_id.clone()),
                fork_point: Some(fork.id.clone()),
                created_at: event.timestamp,
                last_event_timestamp: event.timestamp,
            },
        );
        self.push(event);

        info!(
            "Store '{}' forked universe '{}' ({}) from event {}",
            self.key, name, universe_id, fork.id
        );
        Ok(universe_id)
    }

    /// Merges the last state of `source` into the current universe.
    ///
    /// Only the two universes' last values are compared. Equal values merge
    /// trivially without a new event. Otherwise a resolving strategy records
    /// one `update` event whose parents are both last events, and `manual`
    /// returns the conflict untouched.
    ///
    /// # Errors
    /// `UnknownUniverse` if `source` was never created.
    pub fn merge(&mut self, source: &str, strategy: MergeStrategy) -> Result<MergeResult<T>> {
        if !self.branches.contains_key(source) {
            return Err(CausalError::UnknownUniverse(source.to_string()));
        }

        let ours = self
            .last_event_in(&self.current_universe)
            .cloned()
            .ok_or_else(|| CausalError::UnknownUniverse(self.current_universe.clone()))?;
        let theirs = self
            .last_event_in(source)
            .cloned()
            .ok_or_else(|| CausalError::UnknownUniverse(source.to_string()))?;

        if ours.value == theirs.value {
            debug!("Merge of '{}' into '{}' is trivial", source, self.current_universe);
            return Ok(MergeResult {
                success: true,
                merged_value: Some(ours.value),
                event_id: None,
                conflicts: Vec::new(),
            });
        }

        let resolved = match strategy {
            MergeStrategy::Ours => ours.value.clone(),
            MergeStrategy::Theirs => theirs.value.clone(),
            MergeStrategy::LastWrite => {
                if theirs.timestamp > ours.timestamp {
                    theirs.value.clone()
                } else {
                    ours.value.clone()
                }
            }
            MergeStrategy::Manual => {
                return Ok(MergeResult {
                    success: false,
                    merged_value: None,
                    event_id: None,
                    conflicts: vec![MergeConflict {
                        event_id: theirs.id,
                        ours: ours.value,
                        theirs: theirs.value,
                    }],
                });
            }
        };

        let metadata = EventMetadata {
            source: EventSource::Merge,
            merged_from: Some(source.to_string()),
            ..EventMetadata::default()
        }
        .with_tag("strategy", strategy.as_str());
        let event_id = self.append(
            EventType::Update,
            resolved.clone(),
            vec![ours.id, theirs.id],
            metadata,
            None,
        );
        self.cell.set(resolved.clone());

        info!(
            "Merged universe '{}' into '{}' using {}",
            source,
            self.current_universe,
            strategy.as_str()
        );
        Ok(MergeResult {
            success: true,
            merged_value: Some(resolved),
            event_id: Some(event_id),
            conflicts: Vec::new(),
        })
    }

    /// Moves the write cursor to another universe and loads its latest value
    /// into the base cell (subscribers are notified).
    ///
    /// # Errors
    /// `UnknownUniverse` if the universe was never created.
    pub fn switch_branch(&mut self, universe_id: &str) -> Result<()> {
        if !self.branches.contains_key(universe_id) {
            return Err(CausalError::UnknownUniverse(universe_id.to_string()));
        }
        let value = self
            .last_event_in(universe_id)
            .map(|e| e.value.clone())
            .ok_or_else(|| CausalError::UnknownUniverse(universe_id.to_string()))?;

        self.current_universe = universe_id.to_string();
        self.cell.set(value);
        info!("Store '{}' switched to universe {}", self.key, universe_id);
        Ok(())
    }

    /// Known universes, oldest first.
    pub fn list_branches(&self) -> Vec<&Branch> {
        let mut branches: Vec<&Branch> = self.branches.values().collect();
        branches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        branches
    }

    /// Metadata of one universe.
    pub fn branch_info(&self, universe_id: &str) -> Option<&Branch> {
        self.branches.get(universe_id)
    }

    /// Aggregate figures over the whole log.
    pub fn get_stats(&self) -> StoreStats {
        let stats = calculate_causal_stats(self.graph());
        StoreStats {
            store_key: self.key.clone(),
            total_events: stats.total_events,
            universes: self.branches.len(),
            current_universe: self.current_universe.clone(),
            events_in_current_universe: self
                .history
                .iter()
                .filter(|e| e.universe_id == self.current_universe)
                .count(),
            max_depth: stats.max_depth,
            avg_branching_factor: stats.avg_branching_factor,
            merge_nodes: stats.merge_nodes,
            first_timestamp: self.history.first().map(|e| e.timestamp).unwrap_or(0),
            last_timestamp: self.history.last().map(|e| e.timestamp).unwrap_or(0),
        }
    }

    /// Id of the latest event in the current universe.
    pub fn get_last_event_id(&self) -> Option<&str> {
        self.last_event_in(&self.current_universe)
            .map(|e| e.id.as_str())
    }

    /// Serializes the complete log (all universes, append order) as a JSON array.
    pub fn export_history(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.history)?)
    }

    /// Parses a JSON array produced by [`export_history`](Self::export_history)
    /// and replaces the log with it.
    ///
    /// # Errors
    /// `Serialization` for malformed JSON, otherwise see
    /// [`import_events`](Self::import_events).
    pub fn import_history(&mut self, json: &str) -> Result<()> {
        let events: Vec<CausalEvent<T>> = serde_json::from_str(json)?;
        self.import_events(events)
    }

    /// Replaces the log wholesale, rebuilds branch metadata from the
    /// universes found in it and resynchronizes the base cell.
    ///
    /// The current universe is kept when the imported log knows it,
    /// otherwise it falls back to `main`, then to the first event's universe.
    ///
    /// # Errors
    /// `InvalidHistory` for an empty log or one that breaks the log
    /// invariants, `StoreKeyMismatch` for events of another store.
    pub fn import_events(&mut self, events: Vec<CausalEvent<T>>) -> Result<()> {
        let first = match events.first() {
            Some(first) => first,
            None => {
                warn!("Rejected empty history for store '{}'", self.key);
                return Err(CausalError::InvalidHistory("history is empty".to_string()));
            }
        };
        if first.store_key != self.key {
            return Err(CausalError::StoreKeyMismatch {
                expected: self.key.clone(),
                actual: first.store_key.clone(),
            });
        }
        if let Err(e) = validate_history(&events) {
            warn!("Rejected history for store '{}': {}", self.key, e);
            return Err(e);
        }

        let branches = rebuild_branches(&events);
        let current = if branches.contains_key(&self.current_universe) {
            self.current_universe.clone()
        } else if branches.contains_key(MAIN_UNIVERSE) {
            MAIN_UNIVERSE.to_string()
        } else {
            first.universe_id.clone()
        };

        self.history = events;
        self.branches = branches;
        self.current_universe = current;
        self.graph = OnceLock::new();

        let value = self
            .last_event_in(&self.current_universe)
            .map(|e| e.value.clone())
            .ok_or_else(|| CausalError::UnknownUniverse(self.current_universe.clone()))?;
        self.cell.set(value);

        info!(
            "Imported {} events into store '{}' ({} universes)",
            self.history.len(),
            self.key,
            self.branches.len()
        );
        Ok(())
    }

    /// Latest event of a universe. Timestamps never decrease along the log,
    /// so the last appended match is the latest.
    fn last_event_in(&self, universe: &str) -> Option<&CausalEvent<T>> {
        self.history.iter().rev().find(|e| e.universe_id == universe)
    }

    fn next_timestamp(&self) -> u64 {
        let last = self.history.last().map(|e| e.timestamp).unwrap_or(0);
        self.clock.now_ms().max(last)
    }

    fn append(
        &mut self,
        event_type: EventType,
        value: T,
        caused_by: Vec<String>,
        metadata: EventMetadata,
        observer_id: Option<String>,
    ) -> String {
        let previous_value = self
            .last_event_in(&self.current_universe)
            .map(|e| e.value.clone());
        let event = create_causal_event(
            &self.key,
            event_type,
            value,
            EventOptions {
                previous_value,
                caused_by,
                universe_id: self.current_universe.clone(),
                observer_id: observer_id.or_else(|| self.observer_id.clone()),
                metadata,
                timestamp: Some(self.next_timestamp()),
            },
            self.clock.as_ref(),
        );
        self.push(event)
    }

    fn push(&mut self, event: CausalEvent<T>) -> String {
        if let Some(branch) = self.branches.get_mut(&event.universe_id) {
            branch.last_event_timestamp = event.timestamp;
        }
        debug!(
            "Store '{}' recorded {:?} event {} in universe {}",
            self.key, event.event_type, event.id, event.universe_id
        );
        let id = event.id.clone();
        self.history.push(event);
        self.graph = OnceLock::new();
        id
    }
}

/// Derives branch metadata from the universes present in a log.
fn rebuild_branches<T>(events: &[CausalEvent<T>]) -> BTreeMap<String, Branch> {
    let universe_of: BTreeMap<&str, &str> = events
        .iter()
        .map(|e| (e.id.as_str(), e.universe_id.as_str()))
        .collect();
    let mut branches: BTreeMap<String, Branch> = BTreeMap::new();

    for event in events {
        match branches.get_mut(&event.universe_id) {
            Some(branch) => branch.last_event_timestamp = event.timestamp,
            None => {
                let fork_point = event.caused_by.first().cloned();
                let parent_universe = fork_point
                    .as_deref()
                    .and_then(|id| universe_of.get(id))
                    .map(|u| u.to_string());
                let name = event
                    .metadata
                    .branch_name
                    .clone()
                    .unwrap_or_else(|| event.universe_id.clone());
                branches.insert(
                    event.universe_id.clone(),
                    Branch {
                        id: event.universe_id.clone(),
                        name,
                        parent_universe,
                        fork_point,
                        created_at: event.timestamp,
                        last_event_timestamp: event.timestamp,
                    },
                );
            }
        }
    }

    branches
}

impl<T: fmt::Debug> fmt::Debug for CausalStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CausalStore")
            .field("key", &self.key)
            .field("current_universe", &self.current_universe)
            .field("events", &self.history.len())
            .field("branches", &self.branches.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_at(start: u64) -> (CausalStore<i64>, ManualClock) {
        let clock = ManualClock::new(start);
        let store = CausalStore::with_options(
            "counter",
            0,
            StoreOptions::with_clock(Arc::new(clock.clone())),
        );
        (store, clock)
    }

    #[test]
    fn test_set_chains_to_current_universe() {
        let (mut store, clock) = store_at(100);
        let seed = store.get_last_event_id().unwrap().to_string();
        clock.advance(10);
        let id = store.set(1);

        let event = store.at_event(&id).unwrap();
        assert_eq!(event.caused_by, vec![seed]);
        assert_eq!(event.previous_value, Some(0));
        assert_eq!(event.timestamp, 110);
        assert_eq!(store.get(), 1);
    }

    #[test]
    fn test_reset_uses_seed_value() {
        let (mut store, _) = store_at(100);
        store.set(5);
        store.set(9);
        let id = store.reset();

        assert_eq!(store.get(), 0);
        assert_eq!(store.at_event(&id).unwrap().event_type, EventType::Reset);
    }

    #[test]
    fn test_branch_from_explicit_event_and_timestamp() {
        let (mut store, clock) = store_at(100);
        clock.advance(10);
        let first = store.set(1);
        clock.advance(10);
        store.set(2);

        let by_id = store
            .branch(
                "from-first",
                BranchOptions {
                    fork_point: ForkPoint::Event(first.clone()),
                    ..BranchOptions::default()
                },
            )
            .unwrap();
        let by_time = store
            .branch(
                "at-115",
                BranchOptions {
                    fork_point: ForkPoint::Timestamp(115),
                    ..BranchOptions::default()
                },
            )
            .unwrap();

        store.switch_branch(&by_id).unwrap();
        assert_eq!(store.get(), 1);
        store.switch_branch(&by_time).unwrap();
        assert_eq!(store.get(), 1);
        assert_eq!(store.branch_info(&by_time).unwrap().fork_point, Some(first));
    }

    #[test]
    fn test_branch_errors() {
        let (mut store, _) = store_at(100);
        let unknown = store.branch(
            "x",
            BranchOptions {
                fork_point: ForkPoint::Event("missing".into()),
                ..BranchOptions::default()
            },
        );
        assert!(matches!(unknown, Err(CausalError::UnknownEvent(_))));

        let too_early = store.branch(
            "x",
            BranchOptions {
                fork_point: ForkPoint::Timestamp(1),
                ..BranchOptions::default()
            },
        );
        assert!(matches!(too_early, Err(CausalError::NoForkPoint(_))));
    }

    #[test]
    fn test_manual_merge_reports_conflict_without_writing() {
        let (mut store, _) = store_at(100);
        let other = store.branch("other", BranchOptions::default()).unwrap();
        store.switch_branch(&other).unwrap();
        store.set(7);
        store.switch_branch(MAIN_UNIVERSE).unwrap();
        store.set(3);
        let events_before = store.history().len();

        let result = store.merge(&other, MergeStrategy::Manual).unwrap();
        assert!(!result.success);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].ours, 3);
        assert_eq!(result.conflicts[0].theirs, 7);
        assert_eq!(store.history().len(), events_before);
        assert_eq!(store.get(), 3);
    }

    #[test]
    fn test_trivial_merge_records_nothing() {
        let (mut store, _) = store_at(100);
        let other = store.branch("same", BranchOptions::default()).unwrap();
        let before = store.history().len();

        let result = store.merge(&other, MergeStrategy::Theirs).unwrap();
        assert!(result.success);
        assert!(result.event_id.is_none());
        assert_eq!(store.history().len(), before);
    }

    #[test]
    fn test_unknown_universe_errors() {
        let (mut store, _) = store_at(100);
        assert!(matches!(
            store.switch_branch("nowhere"),
            Err(CausalError::UnknownUniverse(_))
        ));
        assert!(matches!(
            store.merge("nowhere", MergeStrategy::Ours),
            Err(CausalError::UnknownUniverse(_))
        ));
    }

    #[test]
    fn test_query_defaults_to_current_universe() {
        let (mut store, _) = store_at(100);
        let other = store.branch("other", BranchOptions::default()).unwrap();
        store.switch_branch(&other).unwrap();
        store.set(1);

        assert_eq!(store.query(&EventQuery::default()).len(), 2);
        let everything = EventQuery::default().in_universes([MAIN_UNIVERSE, other.as_str()]);
        assert_eq!(store.query(&everything).len(), 3);
    }

    #[test]
    fn test_import_rejects_foreign_and_empty_history() {
        let (mut store, _) = store_at(100);
        assert!(matches!(
            store.import_events(Vec::new()),
            Err(CausalError::InvalidHistory(_))
        ));

        let foreign = CausalStore::new("other", 1i64).history().to_vec();
        assert!(matches!(
            store.import_events(foreign),
            Err(CausalError::StoreKeyMismatch { .. })
        ));
        assert_eq!(store.history().len(), 1);
    }
}
