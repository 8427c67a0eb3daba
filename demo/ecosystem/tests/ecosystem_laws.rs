use causa_analysis::{EmergenceConfig, PatternType};
use causa_core::{BranchOptions, EventSource, MergeStrategy, MAIN_UNIVERSE};
use ecosystem::{grass_for, predators_for, Ecosystem, CARRYING_CAPACITY, PREY_CYCLE};
use serde_json::json;

fn ecosystem() -> Ecosystem {
    Ecosystem::new(EmergenceConfig::default()).unwrap()
}

#[tokio::test]
async fn test_reactions_follow_prey() {
    let eco = ecosystem();
    let write = eco.season(120).await.unwrap();
    assert!(write.lawful());

    let census = eco.census().unwrap();
    assert_eq!(census.prey, json!(120));
    assert_eq!(census.predators, json!(predators_for(120)));
    assert_eq!(census.grass, json!(grass_for(120)));
}

#[tokio::test]
async fn test_overpopulation_is_repaired() {
    let eco = ecosystem();
    let write = eco.season(560).await.unwrap();

    assert_eq!(write.value, json!(CARRYING_CAPACITY));
    let repair_id = write.repair_event_id.unwrap();
    let prey = eco.store("prey").unwrap();
    let prey = prey.lock();
    assert_eq!(prey.at_event(&repair_id).unwrap().metadata.source, EventSource::LawRepair);
    drop(prey);

    // Reactions saw the repaired population
    let census = eco.census().unwrap();
    assert_eq!(census.predators, json!(predators_for(CARRYING_CAPACITY)));
    assert_eq!(census.grass, json!(grass_for(CARRYING_CAPACITY)));
}

#[tokio::test]
async fn test_seasons_synchronize_all_stores() {
    let eco = ecosystem();
    for prey in PREY_CYCLE.iter().cycle().take(12) {
        eco.season(*prey).await.unwrap();
    }

    let sync = eco.detector.patterns_of(PatternType::Synchronization);
    let last = sync.last().unwrap();
    assert_eq!(last.stores_involved, vec!["grass", "predators", "prey"]);
    assert_eq!(last.confidence, 1.0);
    assert_eq!(eco.detector.snapshots().len(), 12);
}

#[tokio::test]
async fn test_drought_branch_leaves_main_untouched() {
    let eco = ecosystem();
    for prey in PREY_CYCLE {
        eco.season(prey).await.unwrap();
    }

    let prey = eco.store("prey").unwrap();
    let mut prey = prey.lock();
    let drought = prey.branch("drought", BranchOptions::default()).unwrap();
    prey.switch_branch(&drought).unwrap();
    prey.set(json!(5));
    assert_eq!(prey.get(), json!(5));

    prey.switch_branch(MAIN_UNIVERSE).unwrap();
    assert_eq!(prey.get(), json!(150));

    let merged = prey.merge(&drought, MergeStrategy::Ours).unwrap();
    assert!(merged.success);
    assert_eq!(merged.merged_value, Some(json!(150)));
    let node = prey.at_event(merged.event_id.as_deref().unwrap()).unwrap();
    assert_eq!(node.caused_by.len(), 2);
}
