//! Law descriptors.
//!
//! A [`UniverseLaw`] binds a name to a constraint, optional cross-store
//! reactions and optional violation/repair hooks. Laws hold no state and
//! are shared as `Arc<UniverseLaw<T>>`.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::error::ReactionError;

/// Future returned by a reaction.
pub type ReactionFuture = BoxFuture<'static, Result<serde_json::Value, ReactionError>>;

/// Async function of the effective state producing a value for a target store.
pub type Reaction<T> = Arc<dyn Fn(T) -> ReactionFuture + Send + Sync>;

/// Called whenever a law finds its constraint violated.
pub type ViolationHook = Arc<dyn Fn(&ViolationReport) + Send + Sync>;

/// Called after a repair was attempted.
pub type RepairHook<T> = Arc<dyn Fn(&RepairReport<T>) + Send + Sync>;

/// Provenance of a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub law: String,
    pub store_key: String,
    pub universe_id: Option<String>,
    pub observer_id: Option<String>,
    pub event_id: Option<String>,
    pub violations: Vec<String>,
    /// True when the repaired value is what violates the law.
    pub after_repair: bool,
}

/// A repair and whether it satisfied the law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport<T> {
    pub law: String,
    pub store_key: String,
    pub original: T,
    pub repaired: T,
    pub valid: bool,
}

/// Optional parts of a law.
pub struct LawOptions<T> {
    pub reactions: BTreeMap<String, Reaction<T>>,
    pub on_violation: Option<ViolationHook>,
    pub on_repair: Option<RepairHook<T>>,
}

impl<T> Default for LawOptions<T> {
    fn default() -> Self {
        Self {
            reactions: BTreeMap::new(),
            on_violation: None,
            on_repair: None,
        }
    }
}

impl<T> LawOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reaction writing to `target`.
    ///
    /// ```rust
    /// use causa_laws::LawOptions;
    ///
    /// let options = LawOptions::<i64>::new()
    ///     .reaction("alerts", |population| async move {
    ///         Ok(serde_json::json!({ "lastPopulation": population }))
    ///     });
    /// assert_eq!(options.reactions.len(), 1);
    /// ```
    pub fn reaction<F, Fut>(mut self, target: impl Into<String>, reaction: F) -> Self
    where
        T: 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ReactionError>> + Send + 'static,
    {
        let boxed: Reaction<T> = Arc::new(move |state: T| reaction(state).boxed());
        self.reactions.insert(target.into(), boxed);
        self
    }

    pub fn on_violation<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ViolationReport) + Send + Sync + 'static,
    {
        self.on_violation = Some(Arc::new(hook));
        self
    }

    pub fn on_repair<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RepairReport<T>) + Send + Sync + 'static,
    {
        self.on_repair = Some(Arc::new(hook));
        self
    }
}

/// A named invariant with its reactions.
pub struct UniverseLaw<T> {
    name: String,
    constraint: Arc<dyn Constraint<T>>,
    reactions: BTreeMap<String, Reaction<T>>,
    on_violation: Option<ViolationHook>,
    on_repair: Option<RepairHook<T>>,
}

impl<T> UniverseLaw<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraint(&self) -> &dyn Constraint<T> {
        self.constraint.as_ref()
    }

    /// Reactions keyed by target store.
    pub fn reactions(&self) -> &BTreeMap<String, Reaction<T>> {
        &self.reactions
    }

    pub(crate) fn notify_violation(&self, report: &ViolationReport) {
        if let Some(hook) = &self.on_violation {
            hook(report);
        }
    }

    pub(crate) fn notify_repair(&self, report: &RepairReport<T>) {
        if let Some(hook) = &self.on_repair {
            hook(report);
        }
    }
}

impl<T> fmt::Debug for UniverseLaw<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniverseLaw")
            .field("name", &self.name)
            .field("reactions", &self.reactions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds an immutable law descriptor.
pub fn define_law<T, C>(
    name: impl Into<String>,
    constraint: C,
    options: LawOptions<T>,
) -> Arc<UniverseLaw<T>>
where
    C: Constraint<T> + 'static,
{
    Arc::new(UniverseLaw {
        name: name.into(),
        constraint: Arc::new(constraint),
        reactions: options.reactions,
        on_violation: options.on_violation,
        on_repair: options.on_repair,
    })
}
