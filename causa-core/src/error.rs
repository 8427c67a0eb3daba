//! Error types for the Causa causal engine.
//!
//! Only structural, caller-side mistakes are errors: unknown ids,
//! unresolvable fork points and malformed imported histories. Constraint
//! violations and merge conflicts are ordinary results and never show up
//! here.

use thiserror::Error;

/// Errors that can occur in causal store and graph operations.
#[derive(Debug, Error)]
pub enum CausalError {
    /// A required event field was not supplied to the builder.
    #[error("Missing required event field: {0}")]
    MissingField(&'static str),

    /// The referenced universe has never been created on this store.
    #[error("Unknown universe: {0}")]
    UnknownUniverse(String),

    /// The referenced event id is not part of the recorded history.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// A branch was requested but no fork point could be resolved.
    #[error("No fork point could be resolved: {0}")]
    NoForkPoint(String),

    /// An event references a parent that does not precede it in the log.
    #[error("Event {event} references {parent}, which is not recorded before it")]
    ForwardReference {
        /// Event carrying the bad reference
        event: String,
        /// Parent id that could not be resolved
        parent: String,
    },

    /// The same event id appears twice in a history.
    #[error("Duplicate event id: {0}")]
    DuplicateEvent(String),

    /// An imported event belongs to another store.
    #[error("Store key mismatch: expected '{expected}', got '{actual}'")]
    StoreKeyMismatch {
        /// Key of the store performing the import
        expected: String,
        /// Key found on the offending event
        actual: String,
    },

    /// Imported history is unusable for another reason (e.g. empty).
    #[error("Invalid history: {0}")]
    InvalidHistory(String),

    /// No store is registered under the key.
    #[error("Unknown store: {0}")]
    UnknownStore(String),

    /// A store is already registered under the key.
    #[error("Store already exists: {0}")]
    DuplicateStore(String),

    /// Every subscriber slot of a cell is taken.
    #[error("Subscriber limit reached ({0} slots)")]
    SubscriberLimit(usize),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for causal operations.
pub type Result<T> = std::result::Result<T, CausalError>;
