//! Pattern detectors over a window of snapshots.
//!
//! Each detector is a pure function of the window and the observed store
//! keys. It returns `None` when the window is too small for it to say
//! anything, never a low-confidence guess.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::EmergenceConfig;
use crate::numeric::{autocorrelation, linear_trend, variance};
use crate::pattern::PatternType;
use crate::window::Snapshot;

/// Fewest snapshots most detectors need.
pub const MIN_SAMPLES: usize = 5;
/// Fewest snapshots for autocorrelation.
pub const OSCILLATION_MIN_SAMPLES: usize = 10;
/// Synchronized fraction of snapshots that must be exceeded.
pub const SYNC_THRESHOLD: f64 = 0.5;
/// Autocorrelation that signals periodicity.
pub const OSCILLATION_THRESHOLD: f64 = 0.7;
/// Absolute regression slope of cross-store variance.
pub const TREND_THRESHOLD: f64 = 0.1;
/// Largest change-rate spread inside one cluster.
pub const CLUSTER_TOLERANCE: f64 = 0.5;
/// Average change rate below which the system is at rest.
pub const EQUILIBRIUM_RATE: f64 = 0.5;
/// Snapshots considered "recent" for equilibrium.
pub const RECENT_SAMPLES: usize = 10;

/// A detector's finding, before it is stamped as a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub stores: Vec<String>,
    pub description: String,
    pub metrics: BTreeMap<String, f64>,
    pub evidence: Vec<String>,
}

impl Detection {
    fn new(pattern_type: PatternType, confidence: f64, stores: Vec<String>, description: String) -> Self {
        Self {
            pattern_type,
            confidence: confidence.clamp(0.0, 1.0),
            stores,
            description,
            metrics: BTreeMap::new(),
            evidence: Vec::new(),
        }
    }

    fn metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    fn evidence(mut self, line: String) -> Self {
        self.evidence.push(line);
        self
    }
}

/// Runs every enabled detector and keeps findings at or above the
/// configured confidence.
pub fn run_detectors(window: &[Snapshot], stores: &[String], config: &EmergenceConfig) -> Vec<Detection> {
    let mut found = Vec::new();
    let enabled = |t: PatternType| config.is_enabled(t);

    if enabled(PatternType::Synchronization) {
        found.extend(detect_synchronization(window, stores));
    }
    if enabled(PatternType::Oscillation) {
        found.extend(detect_oscillation(window, stores));
    }
    if enabled(PatternType::Cascade) {
        found.extend(detect_cascade(window, stores));
    }
    if enabled(PatternType::Convergence) || enabled(PatternType::Divergence) {
        found.extend(detect_variance_trend(window, stores).filter(|d| enabled(d.pattern_type)));
    }
    if enabled(PatternType::Clustering) {
        found.extend(detect_clustering(window, stores));
    }
    if enabled(PatternType::FeedbackLoop) {
        found.extend(detect_feedback_loop(window, stores));
    }
    if enabled(PatternType::Equilibrium) {
        found.extend(detect_equilibrium(window, stores));
    }

    found.retain(|d| d.confidence >= config.min_confidence);
    found
}

/// Two or more stores changing in the same interval, most of the time.
pub fn detect_synchronization(window: &[Snapshot], stores: &[String]) -> Option<Detection> {
    if stores.len() < 2 || window.len() < MIN_SAMPLES {
        return None;
    }

    let synced: Vec<&Snapshot> = window.iter().filter(|s| s.changed_count() >= 2).collect();
    let fraction = synced.len() as f64 / window.len() as f64;
    if fraction <= SYNC_THRESHOLD {
        return None;
    }

    let involved: BTreeSet<String> = synced
        .iter()
        .flat_map(|s| s.change_order.iter().cloned())
        .collect();
    Some(
        Detection::new(
            PatternType::Synchronization,
            fraction,
            involved.into_iter().collect(),
            format!(
                "{} of {} samples show simultaneous changes",
                synced.len(),
                window.len()
            ),
        )
        .metric("syncFraction", fraction)
        .metric("syncedSamples", synced.len() as f64),
    )
}

/// Periodic change activity in individual stores.
pub fn detect_oscillation(window: &[Snapshot], stores: &[String]) -> Option<Detection> {
    if stores.is_empty() || window.len() < OSCILLATION_MIN_SAMPLES {
        return None;
    }

    let mut oscillating = Vec::new();
    let mut best = 0.0f64;
    let mut metrics = BTreeMap::new();

    for store in stores {
        let series: Vec<f64> = window.iter().map(|s| s.changes_of(store) as f64).collect();
        let peak = (1..=series.len() / 2)
            .filter_map(|lag| autocorrelation(&series, lag).map(|r| (lag, r)))
            .fold(None, |acc: Option<(usize, f64)>, (lag, r)| match acc {
                Some((_, best_r)) if best_r >= r => acc,
                _ => Some((lag, r)),
            });

        if let Some((lag, r)) = peak {
            if r > OSCILLATION_THRESHOLD {
                oscillating.push(store.clone());
                metrics.insert(format!("period.{}", store), lag as f64);
                metrics.insert(format!("autocorrelation.{}", store), r);
                best = best.max(r);
            }
        }
    }

    if oscillating.is_empty() {
        return None;
    }
    let mut detection = Detection::new(
        PatternType::Oscillation,
        best,
        oscillating.clone(),
        format!("Periodic activity in {}", oscillating.join(", ")),
    );
    detection.metrics = metrics;
    Some(detection)
}

/// Changes propagating through three or more stores, one after another.
pub fn detect_cascade(window: &[Snapshot], stores: &[String]) -> Option<Detection> {
    if stores.len() < 3 || window.len() < MIN_SAMPLES {
        return None;
    }

    let mut sequence: Vec<&str> = Vec::new();
    for first in window.iter().filter_map(Snapshot::first_changer) {
        if sequence.last() != Some(&first) {
            sequence.push(first);
        }
    }

    // longest run of consecutive first movers without repeats
    let mut longest: &[&str] = &[];
    let mut start = 0;
    for end in 0..sequence.len() {
        if let Some(pos) = sequence[start..end].iter().position(|s| *s == sequence[end]) {
            start += pos + 1;
        }
        if end + 1 - start > longest.len() {
            longest = &sequence[start..=end];
        }
    }

    if longest.len() < 3 {
        return None;
    }
    let chain: Vec<String> = longest.iter().map(|s| s.to_string()).collect();
    Some(
        Detection::new(
            PatternType::Cascade,
            0.5 + 0.1 * chain.len() as f64,
            chain.clone(),
            format!("Change cascade {}", chain.join(" -> ")),
        )
        .metric("length", chain.len() as f64)
        .evidence(chain.join(" -> ")),
    )
}

/// Cross-store variance shrinking (convergence) or growing (divergence).
pub fn detect_variance_trend(window: &[Snapshot], stores: &[String]) -> Option<Detection> {
    if stores.len() < 2 || window.len() < MIN_SAMPLES {
        return None;
    }

    let series: Vec<f64> = window
        .iter()
        .map(Snapshot::numeric_values)
        .filter(|values| values.len() >= 2)
        .filter_map(|values| variance(&values))
        .collect();
    if series.len() < MIN_SAMPLES {
        return None;
    }

    let (slope, r_squared) = linear_trend(&series)?;
    let (pattern_type, verb) = if slope < -TREND_THRESHOLD {
        (PatternType::Convergence, "converging")
    } else if slope > TREND_THRESHOLD {
        (PatternType::Divergence, "diverging")
    } else {
        return None;
    };

    let first = series[0];
    let last = series[series.len() - 1];
    Some(
        Detection::new(
            pattern_type,
            r_squared,
            stores.to_vec(),
            format!("Store values {} (variance {:.2} -> {:.2})", verb, first, last),
        )
        .metric("slope", slope)
        .metric("rSquared", r_squared)
        .metric("startVariance", first)
        .metric("endVariance", last),
    )
}

/// Groups of stores with similar change rates.
///
/// The largest group is reported once it holds two or more stores.
pub fn detect_clustering(window: &[Snapshot], stores: &[String]) -> Option<Detection> {
    if stores.len() < 3 || window.len() < MIN_SAMPLES {
        return None;
    }

    let samples = window.len() as f64;
    let mut rates: Vec<(f64, &String)> = stores
        .iter()
        .map(|store| {
            let total: u64 = window.iter().map(|s| s.changes_of(store)).sum();
            (total as f64 / samples, store)
        })
        .collect();
    rates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    let mut groups: Vec<Vec<(f64, &String)>> = Vec::new();
    for entry in rates {
        match groups.last_mut() {
            Some(group) if entry.0 - group[0].0 <= CLUSTER_TOLERANCE => group.push(entry),
            _ => groups.push(vec![entry]),
        }
    }

    let largest = groups.iter().max_by_key(|g| g.len())?;
    if largest.len() < 2 {
        return None;
    }

    let members: Vec<String> = largest.iter().map(|(_, s)| (*s).clone()).collect();
    let mean_rate = largest.iter().map(|(r, _)| r).sum::<f64>() / largest.len() as f64;
    Some(
        Detection::new(
            PatternType::Clustering,
            largest.len() as f64 / stores.len() as f64,
            members.clone(),
            format!(
                "{} of {} stores change at a similar rate (~{:.2} per sample)",
                members.len(),
                stores.len(),
                mean_rate
            ),
        )
        .metric("groups", groups.len() as f64)
        .metric("clusterSize", largest.len() as f64)
        .metric("meanRate", mean_rate),
    )
}

/// A moves, then B, then A again, over consecutive snapshots.
pub fn detect_feedback_loop(window: &[Snapshot], stores: &[String]) -> Option<Detection> {
    if stores.len() < 2 || window.len() < MIN_SAMPLES {
        return None;
    }

    let firsts: Vec<Option<&str>> = window.iter().map(Snapshot::first_changer).collect();
    let mut pairs: HashMap<(&str, &str), usize> = HashMap::new();
    let mut loops = 0usize;

    for triple in firsts.windows(3) {
        if let [Some(a), Some(b), Some(c)] = triple {
            if a == c && a != b {
                loops += 1;
                let key = if a < b { (*a, *b) } else { (*b, *a) };
                *pairs.entry(key).or_insert(0) += 1;
            }
        }
    }

    if loops == 0 {
        return None;
    }
    let ((a, b), count) = pairs
        .into_iter()
        .max_by(|x, y| x.1.cmp(&y.1).then_with(|| y.0.cmp(&x.0)))?;
    let confidence = 2.0 * loops as f64 / (window.len() - 2) as f64;
    Some(
        Detection::new(
            PatternType::FeedbackLoop,
            confidence,
            vec![a.to_string(), b.to_string()],
            format!("{} and {} keep triggering each other", a, b),
        )
        .metric("loops", loops as f64)
        .metric("pairLoops", count as f64)
        .evidence(format!("{} -> {} -> {}", a, b, a)),
    )
}

/// Little recent change across all stores.
pub fn detect_equilibrium(window: &[Snapshot], stores: &[String]) -> Option<Detection> {
    if stores.is_empty() || window.len() < MIN_SAMPLES {
        return None;
    }

    let recent = &window[window.len().saturating_sub(RECENT_SAMPLES)..];
    let total: u64 = recent
        .iter()
        .flat_map(|s| stores.iter().map(move |k| s.changes_of(k)))
        .sum();
    let rate = total as f64 / (recent.len() * stores.len()) as f64;
    if rate >= EQUILIBRIUM_RATE {
        return None;
    }

    Some(
        Detection::new(
            PatternType::Equilibrium,
            1.0 - rate / EQUILIBRIUM_RATE,
            stores.to_vec(),
            format!("System at rest ({:.2} changes per store per sample)", rate),
        )
        .metric("changeRate", rate),
    )
}
