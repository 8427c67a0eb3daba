//! Error types for causa-analysis.

use thiserror::Error;

/// Errors that can occur while configuring or running analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A store key is already observed by the detector.
    #[error("Store already observed: {0}")]
    AlreadyObserved(String),

    /// The detector's background task needs a tokio runtime.
    #[error("No tokio runtime available to run the detector")]
    NoRuntime,

    /// A value could not be turned into JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from a causal store.
    #[error(transparent)]
    Causal(#[from] causa_core::CausalError),
}

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
