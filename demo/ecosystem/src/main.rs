use causa_analysis::{detect_anomaly, measure_entropy_for, EmergenceConfig};
use causa_core::{BranchOptions, MergeStrategy, MAIN_UNIVERSE};
use ecosystem::{Ecosystem, PREY_CYCLE};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🌿 Starting Ecosystem Simulator - Causal State Engine Demo");

    let eco = Ecosystem::new(EmergenceConfig::default())?;
    println!("🗂️  Stores: {}", eco.stores.keys().join(", "));

    // 1. Run two full population cycles under the laws
    println!("📝 Simulating {} seasons...", PREY_CYCLE.len() * 2);
    for (season, prey) in PREY_CYCLE.iter().cycle().take(PREY_CYCLE.len() * 2).enumerate() {
        let write = eco.season(*prey).await?;
        let census = eco.census()?;
        let note = if write.repair_event_id.is_some() {
            " (repaired by law)"
        } else {
            ""
        };
        println!(
            "   Season {:>2}: reported {:>3} prey -> prey {}{}, predators {}, grass {}",
            season + 1,
            prey,
            census.prey,
            note,
            census.predators,
            census.grass
        );
    }

    // 2. What emerged?
    println!("\n🔭 Emergent patterns:");
    let patterns = eco.detector.patterns();
    if patterns.is_empty() {
        println!("   (none)");
    }
    let mut seen = std::collections::BTreeSet::new();
    for pattern in patterns.iter().rev() {
        if seen.insert(pattern.pattern_type) {
            println!(
                "   {} ({:.2}): {}",
                pattern.pattern_type, pattern.confidence, pattern.description
            );
        }
    }

    // 3. Fork a drought experiment off the prey timeline
    println!("\n🧪 Branching a drought experiment...");
    let prey = eco.store("prey")?;
    let (baseline, current, merged) = {
        let mut prey = prey.lock();
        let baseline = measure_entropy_for(&*prey)?;

        let drought = prey.branch("drought", BranchOptions::default())?;
        prey.switch_branch(&drought)?;
        for survivors in [90, 40, 15, 5] {
            eco.clock.advance(1_000);
            prey.set(json!(survivors));
        }
        let current = measure_entropy_for(&*prey)?;

        prey.switch_branch(MAIN_UNIVERSE)?;
        let merged = prey.merge(&drought, MergeStrategy::Ours)?;
        (baseline, current, merged)
    };

    let anomaly = detect_anomaly(&current, &baseline);
    println!(
        "   Entropy: {:.3} bits -> {:.3} bits (relative change {:.2})",
        baseline.shannon, current.shannon, anomaly.relative
    );
    if anomaly.is_anomaly {
        println!("⚠️  The drought timeline is anomalous compared to the baseline.");
    } else {
        println!("✅ The drought timeline stays within the baseline's range.");
    }
    println!(
        "   Merged back with 'ours': main keeps {} prey (merge event {})",
        merged.merged_value.unwrap_or_default(),
        merged.event_id.as_deref().unwrap_or("-")
    );

    // 4. Export the full history
    let prey = prey.lock();
    let stats = prey.get_stats();
    let export = prey.export_history()?;
    println!(
        "\n📦 Prey history: {} events across {} universes ({} bytes exported)",
        stats.total_events,
        stats.universes,
        export.len()
    );

    println!("\n🏁 Demo completed.");
    Ok(())
}
