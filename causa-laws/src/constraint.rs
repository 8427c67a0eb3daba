//! Constraints and substrates.
//!
//! A [`Constraint`] is a predicate over a store value with an optional
//! deterministic repair. A [`Substrate`] groups several constraints into
//! one, describing the "physics" of a domain.
//!
//! # Example
//!
//! ```rust
//! use causa_laws::{Constraint, FnConstraint};
//!
//! let non_negative = FnConstraint::predicate("population must be >= 0", |v: &i64| *v >= 0)
//!     .with_repair(|v: &i64| (*v).max(0));
//!
//! assert!(!non_negative.validate(&-3).valid);
//! assert_eq!(non_negative.repair(&-3), Some(0));
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Outcome of validating one value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    /// Human-readable reasons, empty when valid.
    pub violations: Vec<String>,
}

impl Validation {
    /// A passing validation.
    pub fn ok() -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
        }
    }

    /// A failing validation with one reason.
    pub fn violated(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            violations: vec![message.into()],
        }
    }

    /// Valid exactly when `violations` is empty.
    pub fn from_violations(violations: Vec<String>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// An invariant over store values.
///
/// Both methods are expected to be pure.
pub trait Constraint<T>: Send + Sync {
    /// Checks `value`.
    fn validate(&self, value: &T) -> Validation;

    /// Returns a repaired value, or `None` when the constraint has no repair.
    fn repair(&self, _value: &T) -> Option<T> {
        None
    }
}

impl<T, C: Constraint<T> + ?Sized> Constraint<T> for Arc<C> {
    fn validate(&self, value: &T) -> Validation {
        (**self).validate(value)
    }

    fn repair(&self, value: &T) -> Option<T> {
        (**self).repair(value)
    }
}

type ValidateFn<T> = Arc<dyn Fn(&T) -> Validation + Send + Sync>;
type RepairFn<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;

/// Constraint built from closures.
pub struct FnConstraint<T> {
    validate: ValidateFn<T>,
    repair: Option<RepairFn<T>>,
}

impl<T> Clone for FnConstraint<T> {
    fn clone(&self) -> Self {
        Self {
            validate: Arc::clone(&self.validate),
            repair: self.repair.clone(),
        }
    }
}

impl<T> FnConstraint<T> {
    /// Constraint from a full validation function.
    pub fn new<F>(validate: F) -> Self
    where
        F: Fn(&T) -> Validation + Send + Sync + 'static,
    {
        Self {
            validate: Arc::new(validate),
            repair: None,
        }
    }

    /// Constraint from a boolean predicate; `message` is the violation text.
    pub fn predicate<F>(message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        Self::new(move |value| {
            if check(value) {
                Validation::ok()
            } else {
                Validation::violated(message.clone())
            }
        })
    }

    /// Adds a repair function.
    pub fn with_repair<F>(mut self, repair: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.repair = Some(Arc::new(repair));
        self
    }
}

impl<T> Constraint<T> for FnConstraint<T> {
    fn validate(&self, value: &T) -> Validation {
        (self.validate)(value)
    }

    fn repair(&self, value: &T) -> Option<T> {
        self.repair.as_ref().map(|repair| repair(value))
    }
}

impl<T> fmt::Debug for FnConstraint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConstraint")
            .field("repairable", &self.repair.is_some())
            .finish()
    }
}

/// A named set of constraints acting as one.
///
/// Validation reports the violations of every member. Repair runs the
/// members in order, each one repairing the output of the previous one
/// when that output violates it.
pub struct Substrate<T> {
    name: String,
    constraints: Vec<Arc<dyn Constraint<T>>>,
}

impl<T> Substrate<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    /// Adds a constraint.
    pub fn with<C: Constraint<T> + 'static>(mut self, constraint: C) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl<T: Clone> Constraint<T> for Substrate<T> {
    fn validate(&self, value: &T) -> Validation {
        let violations = self
            .constraints
            .iter()
            .flat_map(|c| c.validate(value).violations)
            .collect();
        Validation::from_violations(violations)
    }

    fn repair(&self, value: &T) -> Option<T> {
        let mut current: Option<T> = None;
        for constraint in &self.constraints {
            let subject = current.as_ref().unwrap_or(value);
            if constraint.validate(subject).valid {
                continue;
            }
            if let Some(repaired) = constraint.repair(subject) {
                current = Some(repaired);
            }
        }
        current
    }
}

impl<T> fmt::Debug for Substrate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Substrate")
            .field("name", &self.name)
            .field("constraints", &self.constraints.len())
            .finish()
    }
}
