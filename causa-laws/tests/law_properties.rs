//! Property-based tests for law execution.
//!
//! ## Properties Verified
//!
//! - Repair convergence: with a repair that is idempotent on valid values,
//!   executing the law again on the repaired value finds it valid
//! - Substrate repairs satisfy every member constraint

use causa_laws::{
    define_law, execute_law, Constraint, ExecuteOptions, FnConstraint, LawOptions, Substrate,
};
use proptest::prelude::*;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn clamp(lo: i64, hi: i64) -> FnConstraint<i64> {
    FnConstraint::predicate(format!("within [{}, {}]", lo, hi), move |v: &i64| {
        (lo..=hi).contains(v)
    })
    .with_repair(move |v: &i64| (*v).clamp(lo, hi))
}

proptest! {
    /// Property: executing twice on the repaired value is valid both times
    #[test]
    fn prop_repair_converges(value in -10_000i64..10_000, lo in -100i64..0, width in 1i64..200) {
        let law = define_law("clamp", clamp(lo, lo + width), LawOptions::new());

        let first = block_on(execute_law(&law, ExecuteOptions::new(value, "x").repair()));
        prop_assert!(first.satisfied());

        let second = block_on(execute_law(
            &law,
            ExecuteOptions::new(first.effective_state, "x").repair(),
        ));
        prop_assert!(second.valid);
        let third = block_on(execute_law(
            &law,
            ExecuteOptions::new(second.effective_state, "x").repair(),
        ));
        prop_assert!(third.valid);
        prop_assert_eq!(second.effective_state, third.effective_state);
    }

    /// Property: repairing through a substrate of nested ranges lands in all of them
    #[test]
    fn prop_substrate_repair_satisfies_members(value in -1_000i64..1_000) {
        let substrate = Substrate::new("nested")
            .with(clamp(-500, 500))
            .with(clamp(-50, 50))
            .with(clamp(0, 10));

        let repaired = substrate.repair(&value).unwrap_or(value);
        prop_assert!(substrate.validate(&repaired).valid);
    }
}
