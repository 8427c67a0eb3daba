//! Causal event definition.
//!
//! `CausalEvent` is the atomic unit of history: every mutation of a causal
//! store becomes one immutable event carrying the full resulting state and
//! the ids of the events it causally depends on.
//!
//! # Example
//!
//! ```rust
//! use causa_core::{CausalEvent, EventType};
//!
//! let seed = CausalEvent::builder()
//!     .store_key("counter")
//!     .event_type(EventType::Create)
//!     .value(0u32)
//!     .timestamp(1_700_000_000_000)
//!     .build()
//!     .unwrap();
//!
//! let next = CausalEvent::builder()
//!     .store_key("counter")
//!     .value(1u32)
//!     .previous_value(0u32)
//!     .caused_by(vec![seed.id.clone()])
//!     .timestamp(1_700_000_000_500)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(next.caused_by, vec![seed.id]);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{CausalError, Result};

/// Universe every store starts in.
pub const MAIN_UNIVERSE: &str = "main";

/// Bounds every value held by a causal store must satisfy.
pub trait StateValue:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> StateValue for T where
    T: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Kind of mutation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// First event of a universe (store seed or fork).
    Create,
    /// Regular write, merge or law-driven write.
    Update,
    /// Return to the original seed value.
    Reset,
}

/// Provenance of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    /// Store creation.
    Create,
    /// Plain `set`.
    #[default]
    Set,
    /// `reset`.
    Reset,
    /// Synthetic create event of a forked universe.
    Branch,
    /// Merge node joining two universes.
    Merge,
    /// Write performed by a law reaction on another store.
    LawReaction,
    /// Write performed by a law repairing this store's value.
    LawRepair,
}

/// Free-form provenance attached to every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// What produced the event.
    pub source: EventSource,

    /// Human name of the universe, set on branch create events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,

    /// Source universe of a merge node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_from: Option<String>,

    /// Arbitrary extra tags (law names, reaction targets, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, serde_json::Value>,
}

impl EventMetadata {
    /// Metadata with only a source.
    pub fn from_source(source: EventSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Adds a tag, builder style.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Atomic unit of history.
///
/// Events are append-only: once recorded they are never mutated or
/// removed. `caused_by` links form a DAG; merge nodes carry two parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CausalEvent<T> {
    /// Globally unique identifier.
    pub id: String,

    /// Logical store this event belongs to.
    pub store_key: String,

    /// Kind of mutation.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Full state after the event.
    pub value: T,

    /// State before the event, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<T>,

    /// Ordered ids of the events this one depends on.
    #[serde(default)]
    pub caused_by: Vec<String>,

    /// Timeline the event was recorded on.
    pub universe_id: String,

    /// Agent that produced the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer_id: Option<String>,

    /// Unix milliseconds. Ties are broken by position in the log.
    pub timestamp: u64,

    /// Provenance.
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl<T: StateValue> CausalEvent<T> {
    /// Creates a new builder for constructing a `CausalEvent`.
    pub fn builder() -> CausalEventBuilder<T> {
        CausalEventBuilder::default()
    }

    /// True when this event is a merge node.
    pub fn is_merge(&self) -> bool {
        self.caused_by.len() > 1
    }
}

/// Optional fields accepted by [`create_causal_event`].
#[derive(Debug, Clone)]
pub struct EventOptions<T> {
    pub previous_value: Option<T>,
    pub caused_by: Vec<String>,
    pub universe_id: String,
    pub observer_id: Option<String>,
    pub metadata: EventMetadata,
    /// Explicit timestamp; the clock is read when absent.
    pub timestamp: Option<u64>,
}

impl<T> Default for EventOptions<T> {
    fn default() -> Self {
        Self {
            previous_value: None,
            caused_by: Vec::new(),
            universe_id: MAIN_UNIVERSE.to_string(),
            observer_id: None,
            metadata: EventMetadata::default(),
            timestamp: None,
        }
    }
}

/// Builds an event with a fresh id, stamped by `clock` unless the options
/// carry a timestamp.
pub fn create_causal_event<T: StateValue>(
    store_key: &str,
    event_type: EventType,
    value: T,
    opts: EventOptions<T>,
    clock: &dyn Clock,
) -> CausalEvent<T> {
    CausalEvent {
        id: Uuid::new_v4().to_string(),
        store_key: store_key.to_string(),
        event_type,
        value,
        previous_value: opts.previous_value,
        caused_by: opts.caused_by,
        universe_id: opts.universe_id,
        observer_id: opts.observer_id,
        timestamp: opts.timestamp.unwrap_or_else(|| clock.now_ms()),
        metadata: opts.metadata,
    }
}

/// Checks the log invariants of a history in append order:
/// - every id is unique
/// - every `caused_by` id appears earlier in the list
/// - all events share one store key
/// - timestamps never decrease
///
/// # Errors
/// Returns the first violation found.
pub fn validate_history<T>(events: &[CausalEvent<T>]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(events.len());
    let store_key = events.first().map(|e| e.store_key.as_str());
    let mut last_timestamp = 0u64;

    for event in events {
        if event.timestamp < last_timestamp {
            return Err(CausalError::InvalidHistory(format!(
                "event {} goes back in time ({} < {})",
                event.id, event.timestamp, last_timestamp
            )));
        }
        last_timestamp = event.timestamp;

        if let Some(expected) = store_key {
            if event.store_key != expected {
                return Err(CausalError::StoreKeyMismatch {
                    expected: expected.to_string(),
                    actual: event.store_key.clone(),
                });
            }
        }

        for parent in &event.caused_by {
            if !seen.contains(parent.as_str()) {
                return Err(CausalError::ForwardReference {
                    event: event.id.clone(),
                    parent: parent.clone(),
                });
            }
        }

        if !seen.insert(event.id.as_str()) {
            return Err(CausalError::DuplicateEvent(event.id.clone()));
        }
    }

    Ok(())
}

/// Builder for constructing `CausalEvent` instances.
#[derive(Debug)]
pub struct CausalEventBuilder<T> {
    id: Option<String>,
    store_key: Option<String>,
    event_type: Option<EventType>,
    value: Option<T>,
    previous_value: Option<T>,
    caused_by: Vec<String>,
    universe_id: Option<String>,
    observer_id: Option<String>,
    timestamp: Option<u64>,
    metadata: EventMetadata,
}

impl<T> Default for CausalEventBuilder<T> {
    fn default() -> Self {
        Self {
            id: None,
            store_key: None,
            event_type: None,
            value: None,
            previous_value: None,
            caused_by: Vec::new(),
            universe_id: None,
            observer_id: None,
            timestamp: None,
            metadata: EventMetadata::default(),
        }
    }
}

impl<T: StateValue> CausalEventBuilder<T> {
    /// Sets an explicit id (a fresh UUID is generated otherwise).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the owning store key.
    pub fn store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = Some(key.into());
        self
    }

    /// Sets the event type (defaults to `update`).
    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Sets the resulting state.
    pub fn value(mut self, value: T) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the prior state.
    pub fn previous_value(mut self, value: T) -> Self {
        self.previous_value = Some(value);
        self
    }

    /// Sets the causal parents.
    pub fn caused_by(mut self, parents: Vec<String>) -> Self {
        self.caused_by = parents;
        self
    }

    /// Sets the universe (defaults to `main`).
    pub fn universe_id(mut self, universe: impl Into<String>) -> Self {
        self.universe_id = Some(universe.into());
        self
    }

    /// Sets the observer identity.
    pub fn observer_id(mut self, observer: impl Into<String>) -> Self {
        self.observer_id = Some(observer.into());
        self
    }

    /// Sets the timestamp in Unix milliseconds (defaults to the wall clock).
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the provenance metadata.
    pub fn metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builds the `CausalEvent`.
    ///
    /// # Errors
    /// Returns `CausalError::MissingField` if the store key or value is missing.
    pub fn build(self) -> Result<CausalEvent<T>> {
        let store_key = self
            .store_key
            .ok_or(CausalError::MissingField("store_key"))?;
        let value = self.value.ok_or(CausalError::MissingField("value"))?;

        Ok(CausalEvent {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            store_key,
            event_type: self.event_type.unwrap_or(EventType::Update),
            value,
            previous_value: self.previous_value,
            caused_by: self.caused_by,
            universe_id: self
                .universe_id
                .unwrap_or_else(|| MAIN_UNIVERSE.to_string()),
            observer_id: self.observer_id,
            timestamp: self.timestamp.unwrap_or_else(|| SystemClock.now_ms()),
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn event(id: &str, parents: &[&str]) -> CausalEvent<i64> {
        CausalEvent::builder()
            .id(id)
            .store_key("counter")
            .value(0)
            .caused_by(parents.iter().map(|p| p.to_string()).collect())
            .timestamp(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let event = CausalEvent::builder()
            .store_key("counter")
            .value(3i64)
            .timestamp(10)
            .build()
            .unwrap();

        assert_eq!(event.event_type, EventType::Update);
        assert_eq!(event.universe_id, MAIN_UNIVERSE);
        assert_eq!(event.metadata.source, EventSource::Set);
        assert!(!event.id.is_empty());
    }

    #[test]
    fn test_builder_requires_value() {
        let result = CausalEvent::<i64>::builder().store_key("counter").build();
        assert!(matches!(result, Err(CausalError::MissingField("value"))));
    }

    #[test]
    fn test_create_uses_clock_unless_timestamp_given() {
        let clock = ManualClock::new(42);
        let stamped = create_causal_event("k", EventType::Create, 1i64, EventOptions::default(), &clock);
        assert_eq!(stamped.timestamp, 42);

        let explicit = create_causal_event(
            "k",
            EventType::Update,
            2i64,
            EventOptions {
                timestamp: Some(7),
                ..EventOptions::default()
            },
            &clock,
        );
        assert_eq!(explicit.timestamp, 7);
        assert_ne!(stamped.id, explicit.id);
    }

    #[test]
    fn test_validate_history_rejects_forward_reference() {
        let events = vec![event("a", &[]), event("b", &["c"]), event("c", &["a"])];
        let result = validate_history(&events);
        assert!(matches!(result, Err(CausalError::ForwardReference { .. })));
    }

    #[test]
    fn test_validate_history_rejects_duplicates() {
        let events = vec![event("a", &[]), event("a", &[])];
        assert!(matches!(
            validate_history(&events),
            Err(CausalError::DuplicateEvent(_))
        ));
    }

    #[test]
    fn test_serialized_shape_uses_camel_case() {
        let json = serde_json::to_value(event("a", &[])).unwrap();
        assert_eq!(json["storeKey"], "counter");
        assert_eq!(json["type"], "update");
        assert_eq!(json["universeId"], "main");
        assert_eq!(json["metadata"]["source"], "set");
    }
}
