//! # Causa Core
//!
//! **Causal event model and time-travelling state stores**
//!
//! This crate records every mutation of a state cell as an immutable,
//! causally linked event. The resulting log supports time travel, forking
//! into parallel universes and merging them back, and can be exported and
//! replayed elsewhere.
//!
//! ## Features
//!
//! - **Causal Events**: Append-only log; `caused_by` links form a DAG
//! - **Causal Graph**: Ancestor/descendant traversal, range queries, statistics
//! - **Time Travel**: `at(timestamp)`, `between(start, end)`, `at_event(id)`
//! - **Universes**: `branch`, `switch_branch`, `merge` with four strategies
//! - **Registry**: Explicit per-run store registry instead of global state
//!
//! ## Quick Start
//!
//! ```rust
//! use causa_core::CausalStore;
//!
//! let mut store = CausalStore::new("counter", serde_json::json!({ "count": 0 }));
//! store.set(serde_json::json!({ "count": 1 }));
//! store.set(serde_json::json!({ "count": 5 }));
//!
//! // The implicit create event plus two updates
//! assert_eq!(store.history().len(), 3);
//! assert_eq!(store.get()["count"], 5);
//! ```
//!
//! ## Ordering
//!
//! Events are ordered by:
//! 1. **Timestamp** (primary): Unix milliseconds, never decreasing along the log
//! 2. **Append position** (secondary): breaks timestamp ties

pub mod cell;
pub mod clock;
pub mod error;
pub mod event;
pub mod graph;
pub mod registry;
pub mod store;

// Re-export main types for convenience
pub use cell::{Listener, MemoryCell, SubscriptionId, MAX_SUBSCRIBERS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CausalError, Result};
pub use event::{
    create_causal_event, validate_history, CausalEvent, CausalEventBuilder, EventMetadata,
    EventOptions, EventSource, EventType, StateValue, MAIN_UNIVERSE,
};
pub use graph::{
    build_causal_graph, calculate_causal_stats, common_ancestor, find_ancestors,
    find_descendants, query_events, CausalGraph, CausalStats, EventQuery,
};
pub use registry::{StoreHandle, StoreRegistry};
pub use store::{
    Branch, BranchOptions, CausalStore, ForkPoint, MergeConflict, MergeResult, MergeStrategy,
    StoreOptions, StoreStats, WriteOptions,
};
