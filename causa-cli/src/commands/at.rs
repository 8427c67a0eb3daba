//! At command implementation (time travel).

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use crate::history::{load_store, select_universe};
use crate::output;

/// Arguments for the at command.
#[derive(Args)]
pub struct AtArgs {
    /// Exported history file (JSON array of events)
    pub file: PathBuf,

    /// Unix time in milliseconds
    #[arg(short, long, conflicts_with = "event", required_unless_present = "event")]
    pub timestamp: Option<u64>,

    /// Event id to read instead of a time
    #[arg(short, long)]
    pub event: Option<String>,

    /// Universe to read, by id or branch name
    #[arg(short, long)]
    pub universe: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AtJsonOutput {
    universe: String,
    timestamp: Option<u64>,
    event_id: Option<String>,
    found: bool,
    value: Option<Value>,
}

pub async fn run(args: AtArgs) -> i32 {
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

    let (timestamp, event_id, value) = match (&args.event, args.timestamp) {
        (Some(id), _) => match store.at_event(id) {
            Some(event) => (Some(event.timestamp), Some(event.id.clone()), Some(event.value.clone())),
            None => {
                output::error(&format!("Unknown event '{}'", id));
                return 1;
            }
        },
        (None, Some(t)) => (Some(t), None, store.at(t)),
        (None, None) => {
            output::error("Either --timestamp or --event is required");
            return 1;
        }
    };

    if args.json {
        return output::json(&AtJsonOutput {
            universe: store.current_universe().to_string(),
            timestamp,
            event_id,
            found: value.is_some(),
            value,
        });
    }

    match &value {
        Some(v) => {
            output::success(&format!(
                "{} in '{}': {}",
                store.key(),
                store.current_universe(),
                output::value(v)
            ));
            if let Some(id) = &event_id {
                output::kv("Event", id);
            }
            if let Some(t) = timestamp {
                output::kv("Timestamp", &t.to_string());
            }
        }
        None => {
            output::warn(&format!(
                "No event at or before {} in universe '{}'",
                timestamp.unwrap_or(0),
                store.current_universe()
            ));
        }
    }
    0
}
