//! Cross-store reaction tests.
//!
//! Reactions run concurrently against a real `StoreRegistry`. A failing or
//! slow reaction must not block or hide the outcome of its siblings.

use std::sync::Arc;
use std::time::Duration;

use causa_core::{EventSource, StoreRegistry};
use causa_laws::{
    define_law, execute_law, ExecuteOptions, FnConstraint, LawOptions, LawRegistry,
    ReactionError,
};
use serde_json::{json, Value};

fn ecosystem() -> StoreRegistry<Value> {
    let stores = StoreRegistry::new();
    stores.create_store("prey", json!(100)).unwrap();
    stores.create_store("predators", json!(10)).unwrap();
    stores.create_store("alerts", json!([])).unwrap();
    stores
}

#[tokio::test]
async fn test_failing_reaction_does_not_block_siblings() {
    let stores = ecosystem();
    let law = define_law(
        "food-chain",
        FnConstraint::predicate("always", |_: &Value| true),
        LawOptions::new()
            .reaction("predators", |prey: Value| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let prey = prey.as_i64().unwrap_or(0);
                Ok(json!(prey / 10))
            })
            .reaction("alerts", |_| async { Err(ReactionError::failed("alert sink offline")) })
            .reaction("ghosts", |_| async { Ok(json!(1)) }),
    );

    let result = execute_law(
        &law,
        ExecuteOptions::new(json!(200), "prey").reactions(&stores, true),
    )
    .await;

    assert_eq!(result.reactions.len(), 3);
    let by_target = |t: &str| result.reactions.iter().find(|r| r.target == t).unwrap();

    assert!(by_target("predators").is_ok());
    assert!(by_target("predators").applied.is_some());
    assert_eq!(
        by_target("alerts").result,
        Err(ReactionError::Failed("alert sink offline".into()))
    );
    assert!(matches!(
        by_target("ghosts").result,
        Err(ReactionError::Apply { .. })
    ));
    assert_eq!(result.failed_reactions().count(), 2);

    let predators = stores.require("predators").unwrap();
    assert_eq!(predators.lock().get(), json!(20));
    assert_eq!(stores.require("alerts").unwrap().lock().get(), json!([]));
}

#[tokio::test]
async fn test_panicking_reaction_is_captured() {
    let stores = ecosystem();
    let law = define_law(
        "food-chain",
        FnConstraint::predicate("always", |_: &Value| true),
        LawOptions::new()
            .reaction("predators", |prey: Value| async move {
                Ok(json!(prey.as_i64().unwrap_or(0) / 10))
            })
            .reaction("alerts", |_: Value| async move {
                if true {
                    panic!("alert sink crashed");
                }
                Ok(json!([]))
            }),
    );

    let result = execute_law(
        &law,
        ExecuteOptions::new(json!(300), "prey").reactions(&stores, true),
    )
    .await;

    let alerts = result.reactions.iter().find(|r| r.target == "alerts").unwrap();
    match &alerts.result {
        Err(ReactionError::Failed(message)) => assert!(message.contains("alert sink crashed")),
        other => panic!("expected a captured failure, got {:?}", other),
    }
    assert!(alerts.applied.is_none());
    assert_eq!(result.failed_reactions().count(), 1);
    assert_eq!(stores.require("predators").unwrap().lock().get(), json!(30));
}

#[tokio::test]
async fn test_reaction_writes_carry_provenance() {
    let stores = ecosystem();
    let laws = LawRegistry::new();
    laws.register(
        "prey",
        define_law(
            "predators-follow-prey",
            FnConstraint::predicate("always", |_: &Value| true),
            LawOptions::new().reaction("predators", |prey: Value| async move {
                Ok(json!(prey.as_i64().unwrap_or(0) / 5))
            }),
        ),
    );

    let prey = stores.require("prey").unwrap();
    let write = laws.govern_set(&prey, json!(50), Some(&stores)).await;
    assert!(write.repair_event_id.is_none());

    let predators = stores.require("predators").unwrap();
    let store = predators.lock();
    assert_eq!(store.get(), json!(10));
    let last = store.history().last().unwrap();
    assert_eq!(last.metadata.source, EventSource::LawReaction);
    assert_eq!(last.metadata.tags["sourceStore"], json!("prey"));
    assert_eq!(last.metadata.tags["sourceEvent"], json!(write.event_id));
}

#[tokio::test]
async fn test_reactions_see_repaired_state() {
    let stores = ecosystem();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let law = define_law(
        "carrying-capacity",
        FnConstraint::predicate("prey <= 500", |v: &Value| v.as_i64().unwrap_or(0) <= 500)
            .with_repair(|_| json!(500)),
        LawOptions::new().reaction("alerts", move |prey: Value| {
            sink.lock().push(prey.clone());
            async move { Ok(json!([{ "capped": prey }])) }
        }),
    );

    let result = execute_law(
        &law,
        ExecuteOptions::new(json!(900), "prey")
            .repair()
            .reactions(&stores, true),
    )
    .await;

    assert_eq!(result.effective_state, json!(500));
    assert_eq!(*seen.lock(), vec![json!(500)]);
    assert_eq!(
        stores.require("alerts").unwrap().lock().get(),
        json!([{ "capped": 500 }])
    );
}
