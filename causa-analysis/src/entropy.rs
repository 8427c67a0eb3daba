//! Entropy and anomaly analysis over causal graphs.
//!
//! [`measure_entropy`] reports the Shannon entropy of the values recorded
//! in a graph together with a structural complexity score. [`detect_anomaly`]
//! compares two reports and flags a large relative change in entropy.
//!
//! # Example
//!
//! ```rust
//! use causa_analysis::{detect_anomaly, measure_entropy_for};
//! use causa_core::CausalStore;
//!
//! let mut calm = CausalStore::new("calm", 1i64);
//! calm.set(1);
//! calm.set(1);
//!
//! let mut noisy = CausalStore::new("noisy", 1i64);
//! noisy.set(2);
//! noisy.set(3);
//!
//! let baseline = measure_entropy_for(&calm).unwrap();
//! let current = measure_entropy_for(&noisy).unwrap();
//! assert_eq!(baseline.shannon, 0.0);
//! assert!(detect_anomaly(&current, &baseline).is_anomaly);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use causa_core::{calculate_causal_stats, CausalGraph, CausalStore, StateValue};

use crate::config::AnomalyConfig;
use crate::error::Result;

/// Figures the entropy report is derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntropyMetadata {
    pub unique_states: usize,
    pub avg_branching_factor: f64,
    pub max_depth: usize,
    pub total_events: usize,
}

/// Information content and structural complexity of one graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntropyReport {
    /// Shannon entropy of the value distribution, in bits.
    pub shannon: f64,
    pub causal_complexity: f64,
    pub metadata: EntropyMetadata,
}

/// Deviation of a report from a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub is_anomaly: bool,
    /// `current.shannon - baseline.shannon`.
    pub delta: f64,
    /// `|delta|` relative to the baseline (floored at one bit).
    pub relative: f64,
}

/// `(1 + avg_branching_factor) * log2(1 + max_depth)`.
///
/// Grows with both more branching and deeper chains.
pub fn causal_complexity(avg_branching_factor: f64, max_depth: usize) -> f64 {
    (1.0 + avg_branching_factor) * (1.0 + max_depth as f64).log2()
}

/// Shannon entropy, in bits, of a symbol multiset given by its counts.
pub fn shannon_entropy<I: IntoIterator<Item = usize>>(counts: I) -> f64 {
    let counts: Vec<usize> = counts.into_iter().filter(|&c| c > 0).collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    -counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Measures a graph.
///
/// Each distinct value is one symbol, identified by its JSON text and
/// weighted by how many events carry it.
///
/// # Errors
/// `Serialization` if a value cannot be rendered as JSON.
pub fn measure_entropy<T: Serialize>(graph: &CausalGraph<T>) -> Result<EntropyReport> {
    let mut symbols: HashMap<String, usize> = HashMap::new();
    for event in graph.events() {
        *symbols.entry(serde_json::to_string(&event.value)?).or_insert(0) += 1;
    }

    let stats = calculate_causal_stats(graph);
    Ok(EntropyReport {
        shannon: shannon_entropy(symbols.values().copied()),
        causal_complexity: causal_complexity(stats.avg_branching_factor, stats.max_depth),
        metadata: EntropyMetadata {
            unique_states: symbols.len(),
            avg_branching_factor: stats.avg_branching_factor,
            max_depth: stats.max_depth,
            total_events: stats.total_events,
        },
    })
}

/// Measures a store's complete graph (all universes).
pub fn measure_entropy_for<T: StateValue>(store: &CausalStore<T>) -> Result<EntropyReport> {
    measure_entropy(store.graph())
}

/// Compares `current` against `baseline` with the default threshold.
pub fn detect_anomaly(current: &EntropyReport, baseline: &EntropyReport) -> AnomalyReport {
    AnomalyDetector::default().check(current, baseline)
}

/// Anomaly check with a configurable threshold.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    /// # Errors
    /// `InvalidConfig` for a non-positive threshold.
    pub fn new(config: AnomalyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn threshold(&self) -> f64 {
        self.config.relative_threshold
    }

    /// Flags when the relative entropy change exceeds the threshold.
    ///
    /// The relative change is `|delta| / max(baseline, 1)`, so a larger
    /// deviation is never less likely to be flagged.
    pub fn check(&self, current: &EntropyReport, baseline: &EntropyReport) -> AnomalyReport {
        let delta = current.shannon - baseline.shannon;
        let relative = delta.abs() / baseline.shannon.max(1.0);
        let is_anomaly = relative > self.config.relative_threshold;
        if is_anomaly {
            warn!(
                "Entropy anomaly: {:.3} bits vs baseline {:.3} (relative change {:.2})",
                current.shannon, baseline.shannon, relative
            );
        }
        AnomalyReport {
            is_anomaly,
            delta,
            relative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causa_core::{build_causal_graph, BranchOptions, CausalEvent};

    fn chain(values: &[i64]) -> Vec<CausalEvent<i64>> {
        let mut events: Vec<CausalEvent<i64>> = Vec::new();
        for (i, v) in values.iter().enumerate() {
            let parents = events.last().map(|e| vec![e.id.clone()]).unwrap_or_default();
            events.push(
                CausalEvent::builder()
                    .id(format!("e{}", i))
                    .store_key("k")
                    .value(*v)
                    .caused_by(parents)
                    .timestamp(i as u64)
                    .build()
                    .unwrap(),
            );
        }
        events
    }

    fn report(shannon: f64) -> EntropyReport {
        EntropyReport {
            shannon,
            causal_complexity: 0.0,
            metadata: EntropyMetadata {
                unique_states: 0,
                avg_branching_factor: 0.0,
                max_depth: 0,
                total_events: 0,
            },
        }
    }

    #[test]
    fn test_uniform_distribution() {
        let graph = build_causal_graph(&chain(&[1, 2, 3, 4]));
        let entropy = measure_entropy(&graph).unwrap();
        assert!((entropy.shannon - 2.0).abs() < 1e-9);
        assert_eq!(entropy.metadata.unique_states, 4);
        assert_eq!(entropy.metadata.max_depth, 3);
        assert_eq!(entropy.metadata.total_events, 4);
    }

    #[test]
    fn test_constant_values_have_zero_entropy() {
        let graph = build_causal_graph(&chain(&[7, 7, 7]));
        assert_eq!(measure_entropy(&graph).unwrap().shannon, 0.0);
        let empty = build_causal_graph::<i64>(&[]);
        let report = measure_entropy(&empty).unwrap();
        assert_eq!(report.shannon, 0.0);
        assert_eq!(report.causal_complexity, 0.0);
    }

    #[test]
    fn test_branching_raises_complexity() {
        let mut linear = CausalStore::new("k", 0i64);
        let mut forked = CausalStore::new("k", 0i64);
        for i in 1..4 {
            linear.set(i);
            forked.set(i);
        }
        forked.branch("a", BranchOptions::default()).unwrap();
        forked.branch("b", BranchOptions::default()).unwrap();

        let linear = measure_entropy_for(&linear).unwrap();
        let forked = measure_entropy_for(&forked).unwrap();
        assert!(forked.causal_complexity > linear.causal_complexity);
    }

    #[test]
    fn test_anomaly_is_monotone_in_deviation() {
        let baseline = report(2.0);
        let detector = AnomalyDetector::default();

        let mut flagged = false;
        for step in 0..40 {
            let current = report(2.0 + step as f64 * 0.1);
            let result = detector.check(&current, &baseline);
            assert!(!flagged || result.is_anomaly);
            flagged = result.is_anomaly;
        }
        assert!(flagged);
    }

    #[test]
    fn test_small_baselines_use_one_bit_floor() {
        let result = detect_anomaly(&report(0.4), &report(0.0));
        assert!(!result.is_anomaly);
        assert!((result.relative - 0.4).abs() < 1e-9);
        assert!(detect_anomaly(&report(0.6), &report(0.0)).is_anomaly);
    }

    #[test]
    fn test_custom_threshold() {
        let strict = AnomalyDetector::new(AnomalyConfig {
            relative_threshold: 0.1,
        })
        .unwrap();
        assert!(strict.check(&report(2.3), &report(2.0)).is_anomaly);
        assert!(!detect_anomaly(&report(2.3), &report(2.0)).is_anomaly);
    }
}
