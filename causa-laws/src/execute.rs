//! Law evaluation.
//!
//! [`execute_law`] checks a value against a law, optionally repairs it,
//! and runs the law's cross-store reactions concurrently. Violations and
//! reaction failures are reported in the returned [`LawExecution`]; nothing
//! here returns an error.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use causa_core::{CausalEvent, StateValue};

use crate::error::{ReactionError, Result};
use crate::law::{RepairReport, UniverseLaw, ViolationReport};

/// Provenance passed along with a reaction write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionMeta {
    pub law: String,
    pub source_store: String,
    pub source_event: Option<String>,
}

/// Something that can write reaction results to target stores.
pub trait ReactionContext: Send + Sync {
    /// Writes `value` to the store under `key` and returns the event id.
    fn set_state(&self, key: &str, value: serde_json::Value, meta: ReactionMeta) -> Result<String>;
}

/// Inputs for [`execute_law`].
pub struct ExecuteOptions<'a, T> {
    pub state: T,
    pub store_key: &'a str,
    /// Event that produced `state`, for provenance.
    pub event: Option<&'a CausalEvent<T>>,
    pub attempt_repair: bool,
    /// Reactions only run when a context is supplied.
    pub context: Option<&'a dyn ReactionContext>,
    /// Write successful reaction outputs through the context.
    pub apply_reactions: bool,
}

impl<'a, T> ExecuteOptions<'a, T> {
    /// Plain evaluation: no repair, no reactions.
    pub fn new(state: T, store_key: &'a str) -> Self {
        Self {
            state,
            store_key,
            event: None,
            attempt_repair: false,
            context: None,
            apply_reactions: false,
        }
    }

    pub fn event(mut self, event: &'a CausalEvent<T>) -> Self {
        self.event = Some(event);
        self
    }

    pub fn repair(mut self) -> Self {
        self.attempt_repair = true;
        self
    }

    /// Runs reactions against `context`, applying their outputs when `apply` is set.
    pub fn reactions(mut self, context: &'a dyn ReactionContext, apply: bool) -> Self {
        self.context = Some(context);
        self.apply_reactions = apply;
        self
    }
}

/// Result of one reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionOutcome {
    pub target: String,
    pub result: Result<serde_json::Value>,
    /// Event written to the target store, when applied.
    pub applied: Option<String>,
}

impl ReactionOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything [`execute_law`] found and did.
#[derive(Debug, Clone, PartialEq)]
pub struct LawExecution<T> {
    pub law: String,
    pub store_key: String,
    /// Whether the input state satisfied the law.
    pub valid: bool,
    pub violations: Vec<String>,
    /// Repaired value, if a repair ran.
    pub repaired: Option<T>,
    /// Whether the repaired value satisfies the law.
    pub repair_valid: Option<bool>,
    /// Repaired value when there is one, otherwise the input.
    pub effective_state: T,
    pub reactions: Vec<ReactionOutcome>,
}

impl<T> LawExecution<T> {
    /// True when the effective state satisfies the law.
    pub fn satisfied(&self) -> bool {
        self.valid || self.repair_valid == Some(true)
    }

    /// Reactions that failed.
    pub fn failed_reactions(&self) -> impl Iterator<Item = &ReactionOutcome> {
        self.reactions.iter().filter(|r| !r.is_ok())
    }
}

/// Evaluates `law` against `options.state`.
///
/// 1. Validate. On violation, call the law's violation hook.
/// 2. When repair is requested and the constraint has one, repair,
///    re-validate and call the repair hook. A repaired value that still
///    violates the law triggers the violation hook again.
/// 3. With a context, run every reaction concurrently on the effective
///    state and wait for all of them. Failures are captured per target.
pub async fn execute_law<T: StateValue>(
    law: &UniverseLaw<T>,
    options: ExecuteOptions<'_, T>,
) -> LawExecution<T> {
    let ExecuteOptions {
        state,
        store_key,
        event,
        attempt_repair,
        context,
        apply_reactions,
    } = options;

    let report = |violations: Vec<String>, after_repair: bool| ViolationReport {
        law: law.name().to_string(),
        store_key: store_key.to_string(),
        universe_id: event.map(|e| e.universe_id.clone()),
        observer_id: event.and_then(|e| e.observer_id.clone()),
        event_id: event.map(|e| e.id.clone()),
        violations,
        after_repair,
    };

    let validation = law.constraint().validate(&state);
    let mut repaired = None;
    let mut repair_valid = None;

    if !validation.valid {
        warn!(
            "Law '{}' violated on store '{}': {}",
            law.name(),
            store_key,
            validation.violations.join("; ")
        );
        law.notify_violation(&report(validation.violations.clone(), false));

        if attempt_repair {
            if let Some(candidate) = law.constraint().repair(&state) {
                let recheck = law.constraint().validate(&candidate);
                info!(
                    "Law '{}' repaired store '{}' (valid after repair: {})",
                    law.name(),
                    store_key,
                    recheck.valid
                );
                law.notify_repair(&RepairReport {
                    law: law.name().to_string(),
                    store_key: store_key.to_string(),
                    original: state.clone(),
                    repaired: candidate.clone(),
                    valid: recheck.valid,
                });
                if !recheck.valid {
                    warn!(
                        "Repair by law '{}' still violates it: {}",
                        law.name(),
                        recheck.violations.join("; ")
                    );
                    law.notify_violation(&report(recheck.violations, true));
                }
                repair_valid = Some(recheck.valid);
                repaired = Some(candidate);
            }
        }
    }

    let effective_state = repaired.clone().unwrap_or_else(|| state.clone());

    let reactions = match context {
        Some(context) if !law.reactions().is_empty() => {
            let meta = ReactionMeta {
                law: law.name().to_string(),
                source_store: store_key.to_string(),
                source_event: event.map(|e| e.id.clone()),
            };
            run_reactions(law, &effective_state, context, apply_reactions, meta).await
        }
        _ => Vec::new(),
    };

    LawExecution {
        law: law.name().to_string(),
        store_key: store_key.to_string(),
        valid: validation.valid,
        violations: validation.violations,
        repaired,
        repair_valid,
        effective_state,
        reactions,
    }
}

async fn run_reactions<T: StateValue>(
    law: &UniverseLaw<T>,
    state: &T,
    context: &dyn ReactionContext,
    apply: bool,
    meta: ReactionMeta,
) -> Vec<ReactionOutcome> {
    let targets: Vec<String> = law.reactions().keys().cloned().collect();
    // a panicking reaction is reported like any other failure
    let pending = law.reactions().values().map(|reaction| {
        let state = state.clone();
        async move {
            match AssertUnwindSafe(async move { reaction(state).await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => Err(ReactionError::failed(format!(
                    "reaction panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            }
        }
    });
    let results = join_all(pending).await;

    targets
        .into_iter()
        .zip(results)
        .map(|(target, result)| {
            let mut applied = None;
            let result = match result {
                Ok(value) if apply => {
                    match context.set_state(&target, value.clone(), meta.clone()) {
                        Ok(event_id) => {
                            applied = Some(event_id);
                            Ok(value)
                        }
                        Err(e) => Err(e),
                    }
                }
                other => other,
            };
            if let Err(e) = &result {
                warn!("Reaction of law '{}' on '{}' failed: {}", law.name(), target, e);
            }
            ReactionOutcome {
                target,
                result,
                applied,
            }
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Wraps a reaction result conversion failure for `target`.
pub(crate) fn conversion_error(target: &str, err: impl std::fmt::Display) -> ReactionError {
    ReactionError::Conversion {
        target: target.to_string(),
        message: err.to_string(),
    }
}
