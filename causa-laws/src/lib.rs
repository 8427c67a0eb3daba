//! # Causa Laws
//!
//! **Declarative invariants for causal stores**
//!
//! A law binds a named [`Constraint`] to a store key. When the store
//! changes, the law checks the new value, optionally repairs it and
//! optionally triggers asynchronous reactions that write to other stores.
//!
//! ## Features
//!
//! - **Constraints**: Pure predicates with optional deterministic repair
//! - **Substrates**: Groups of constraints that act as one
//! - **Reactions**: Concurrent cross-store writes with per-target failure isolation
//! - **Registry**: Laws bound per store key, deduplicated by name
//! - **Governed writes**: Write, enforce, record the repair
//!
//! Violations are reported through hooks and results, never as errors.

pub mod constraint;
pub mod context;
pub mod error;
pub mod execute;
pub mod law;
pub mod registry;

// Re-export main types for convenience
pub use constraint::{Constraint, FnConstraint, Substrate, Validation};
pub use error::{ReactionError, Result};
pub use execute::{
    execute_law, ExecuteOptions, LawExecution, ReactionContext, ReactionMeta, ReactionOutcome,
};
pub use law::{
    define_law, LawOptions, Reaction, ReactionFuture, RepairHook, RepairReport, UniverseLaw,
    ViolationHook, ViolationReport,
};
pub use registry::{GovernOptions, GovernedWrite, LawRegistry};
