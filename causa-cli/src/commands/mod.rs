//! CLI command implementations.

pub mod at;
pub mod branches;
pub mod entropy;
pub mod inspect;
pub mod replay;
