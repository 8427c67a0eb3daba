//! Emergent pattern records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of cross-store behavior the detector recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternType {
    Synchronization,
    Oscillation,
    Cascade,
    Convergence,
    Divergence,
    Clustering,
    FeedbackLoop,
    Equilibrium,
}

impl PatternType {
    /// Every pattern type, in detection order.
    pub const ALL: [PatternType; 8] = [
        PatternType::Synchronization,
        PatternType::Oscillation,
        PatternType::Cascade,
        PatternType::Convergence,
        PatternType::Divergence,
        PatternType::Clustering,
        PatternType::FeedbackLoop,
        PatternType::Equilibrium,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::Synchronization => "synchronization",
            PatternType::Oscillation => "oscillation",
            PatternType::Cascade => "cascade",
            PatternType::Convergence => "convergence",
            PatternType::Divergence => "divergence",
            PatternType::Clustering => "clustering",
            PatternType::FeedbackLoop => "feedback-loop",
            PatternType::Equilibrium => "equilibrium",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected higher-order behavior spanning one or more stores.
///
/// Patterns are derived and ephemeral; they never enter a causal log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergentPattern {
    pub id: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub stores_involved: Vec<String>,
    pub detected_at: u64,
    pub description: String,
    pub metrics: BTreeMap<String, f64>,
    pub evidence: Vec<String>,
}
