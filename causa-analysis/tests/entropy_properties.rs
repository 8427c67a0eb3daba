//! Property-based tests for the entropy and anomaly analyzers.
//!
//! ## Properties Verified
//!
//! - Shannon entropy is bounded by `log2(unique_states)`
//! - Writing a never-seen value to a store never lowers its entropy
//! - A larger deviation from the baseline is at least as likely to be flagged
//! - Complexity grows with branching and depth

use causa_analysis::{
    causal_complexity, measure_entropy_for, AnomalyConfig, AnomalyDetector, EntropyMetadata,
    EntropyReport,
};
use causa_core::CausalStore;
use proptest::prelude::*;

fn store_of(values: &[i64]) -> CausalStore<i64> {
    let mut store = CausalStore::new("prop", values[0]);
    for v in &values[1..] {
        store.set(*v);
    }
    store
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

proptest! {
    #[test]
    fn prop_entropy_bounded_by_unique_states(values in prop::collection::vec(-5i64..5, 1..40)) {
        let entropy = measure_entropy_for(&store_of(&values)).unwrap();
        let bound = (entropy.metadata.unique_states as f64).log2();
        prop_assert!(entropy.shannon >= 0.0);
        prop_assert!(entropy.shannon <= bound + 1e-9);
        prop_assert_eq!(entropy.metadata.total_events, values.len());
    }

    #[test]
    fn prop_fresh_value_never_lowers_entropy(values in prop::collection::vec(0i64..4, 1..40)) {
        let mut store = store_of(&values);
        let before = measure_entropy_for(&store).unwrap().shannon;
        store.set(1_000);
        let after = measure_entropy_for(&store).unwrap().shannon;
        prop_assert!(after >= before - 1e-9);
    }

    #[test]
    fn prop_anomaly_monotone_in_deviation(
        baseline in 0.0f64..8.0,
        small in 0.0f64..4.0,
        extra in 0.0f64..4.0,
        threshold in 0.05f64..2.0,
        upward in any::<bool>(),
    ) {
        let detector = AnomalyDetector::new(AnomalyConfig { relative_threshold: threshold }).unwrap();
        let sign = if upward { 1.0 } else { -1.0 };
        let near = detector.check(&report(baseline + sign * small), &report(baseline));
        let far = detector.check(&report(baseline + sign * (small + extra)), &report(baseline));
        prop_assert!(!near.is_anomaly || far.is_anomaly);
        prop_assert!(far.relative >= near.relative);
    }

    #[test]
    fn prop_complexity_monotone(bf in 0.0f64..5.0, depth in 0usize..100, more_bf in 0.0f64..2.0, more_depth in 0usize..20) {
        let base = causal_complexity(bf, depth);
        prop_assert!(causal_complexity(bf + more_bf, depth) >= base);
        prop_assert!(causal_complexity(bf, depth + more_depth) >= base);
    }
}
