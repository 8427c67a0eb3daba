//! Inspect command implementation.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use causa_core::StoreStats;

use crate::history::{load_store, select_universe};
use crate::output;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Exported history file (JSON array of events)
    pub file: PathBuf,

    /// Universe to inspect, by id or branch name
    #[arg(short, long)]
    pub universe: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectJsonOutput {
    stats: StoreStats,
    value: Value,
    last_event_id: Option<String>,
}

pub async fn run(args: InspectArgs) -> i32 {
    let mut store = match load_store(&args.file).await {
        Ok(s) => s,
        Err(e) => {
            output::error(&e);
            return 1;
        }
    };
    if let Some(universe) = &args.universe {
        if let Err(e) = select_universe(&mut store, universe) {
            output::error(&e);
            return 1;
        }
    }

    let stats = store.get_stats();
    let value = store.get();
    let last_event_id = store.get_last_event_id().map(str::to_string);

    if args.json {
        return output::json(&InspectJsonOutput {
            stats,
            value,
            last_event_id,
        });
    }

    output::header(&format!("Store: {}", stats.store_key));
    output::kv("Universe", &stats.current_universe);
    output::kv("Value", &output::value(&value));
    output::kv("Last event", last_event_id.as_deref().unwrap_or("-"));
    output::kv(
        "Events",
        &format!(
            "{} total, {} in this universe",
            stats.total_events, stats.events_in_current_universe
        ),
    );
    output::kv("Universes", &stats.universes.to_string());
    output::kv("Merge nodes", &stats.merge_nodes.to_string());
    output::kv("Max depth", &stats.max_depth.to_string());
    output::kv("Avg branching", &format!("{:.2}", stats.avg_branching_factor));
    output::kv(
        "Time span",
        &format!("{} .. {} ms", stats.first_timestamp, stats.last_timestamp),
    );
    println!();
    if stats.universes > 1 {
        output::hint("Use `causa branches` to list the universes.");
    }
    0
}
