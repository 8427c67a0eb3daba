//! Error types for law reactions.

use thiserror::Error;

/// Failure of a single cross-store reaction.
///
/// Reaction failures are captured in [`crate::LawExecution`] next to the
/// successful outcomes. They never abort the law evaluation or sibling
/// reactions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReactionError {
    /// The reaction itself reported an error.
    #[error("Reaction failed: {0}")]
    Failed(String),

    /// The reaction produced a value but writing it to the target failed.
    #[error("Could not apply reaction to '{target}': {message}")]
    Apply { target: String, message: String },

    /// The reaction's output does not deserialize into the target's value type.
    #[error("Reaction output for '{target}' has the wrong shape: {message}")]
    Conversion { target: String, message: String },
}

impl ReactionError {
    /// Shorthand for [`ReactionError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        ReactionError::Failed(message.into())
    }
}

/// Result type for reaction operations.
pub type Result<T> = std::result::Result<T, ReactionError>;
