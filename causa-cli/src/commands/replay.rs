//! Replay command implementation.
//!
//! Feeds the recorded values of several stores, in timestamp order, into
//! cells watched by the emergence detector. Recorded time is cut into
//! buckets and the detector ticks once per bucket.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use causa_analysis::{EmergenceDetector, EmergentPattern};
use causa_core::MemoryCell;

use crate::config::CliConfig;
use crate::history::{load_store, select_universe};
use crate::output;

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Exported history files, one per store
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Milliseconds of recorded time per detector tick (overrides config)
    #[arg(short, long)]
    pub bucket_ms: Option<u64>,

    /// Universe to replay in every store, by id or branch name
    #[arg(short, long)]
    pub universe: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayJsonOutput {
    stores: Vec<String>,
    events: usize,
    ticks: u64,
    bucket_ms: u64,
    patterns: Vec<EmergentPattern>,
}

/// One recorded write on the merged timeline.
struct Write {
    timestamp: u64,
    cell: usize,
    value: Value,
}

pub async fn run(args: ReplayArgs, config: &CliConfig) -> i32 {
    let bucket_ms = args.bucket_ms.unwrap_or(config.replay.bucket_ms);
    if bucket_ms == 0 {
        output::error("Bucket size must be > 0.");
        return 1;
    }

    let detector = match EmergenceDetector::new(config.emergence.clone()) {
        Ok(d) => d,
        Err(e) => {
            output::error(&e.to_string());
            return 1;
        }
    };

    // 1. Load every store and lay its writes on one timeline
    let mut keys = Vec::new();
    let mut cells = Vec::new();
    let mut timeline = Vec::new();
    for path in &args.files {
        let mut store = match load_store(path).await {
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

        let cell = MemoryCell::new(Value::Null);
        if let Err(e) = detector.observe(store.key(), cell.clone()) {
            output::error(&e.to_string());
            return 1;
        }
        let index = cells.len();
        timeline.extend(
            store
                .history()
                .iter()
                .filter(|e| e.universe_id == store.current_universe())
                .map(|e| Write {
                    timestamp: e.timestamp,
                    cell: index,
                    value: e.value.clone(),
                }),
        );
        keys.push(store.key().to_string());
        cells.push(cell);
    }
    timeline.sort_by_key(|w| w.timestamp);

    let (start, end) = match (timeline.first(), timeline.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => {
            output::error("Nothing to replay");
            return 1;
        }
    };
    let ticks = (end - start) / bucket_ms + 1;
    if ticks > config.replay.max_ticks {
        output::error(&format!(
            "Replay would take {} ticks (limit {}). Use a larger --bucket-ms.",
            ticks, config.replay.max_ticks
        ));
        return 1;
    }

    if !args.json {
        output::header(&format!("Replay: {}", keys.join(", ")));
        output::info(&format!(
            "{} writes over {} ms, {} ticks of {} ms",
            timeline.len(),
            end - start,
            ticks,
            bucket_ms
        ));
    }

    // 2. Apply each bucket's writes, then tick
    let mut emitted = Vec::new();
    let mut writes = timeline.iter().peekable();
    for tick in 0..ticks {
        let bucket_end = start + (tick + 1) * bucket_ms;
        while let Some(write) = writes.next_if(|w| w.timestamp < bucket_end) {
            cells[write.cell].set(write.value.clone());
        }
        emitted.extend(detector.tick_at(bucket_end));
    }

    if args.json {
        return output::json(&ReplayJsonOutput {
            stores: keys,
            events: timeline.len(),
            ticks,
            bucket_ms,
            patterns: emitted,
        });
    }

    // 3. Summarize per pattern type
    if emitted.is_empty() {
        output::info("No emergent patterns detected");
        println!();
        output::hint("Lower emergence.min_confidence or --bucket-ms in causa.toml to see weaker signals.");
        return 0;
    }

    let mut best: BTreeMap<_, (usize, &EmergentPattern)> = BTreeMap::new();
    for pattern in &emitted {
        let entry = best.entry(pattern.pattern_type).or_insert((0, pattern));
        entry.0 += 1;
        if pattern.confidence > entry.1.confidence {
            entry.1 = pattern;
        }
    }

    println!();
    println!(
        "{:<16} {:<7} {:<11} {}",
        "Pattern".bold(),
        "Ticks".bold(),
        "Confidence".bold(),
        "Description".bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for (pattern_type, (count, pattern)) in &best {
        println!(
            "{:<16} {:<7} {:<11} {}",
            pattern_type.as_str().green(),
            count,
            format!("{:.2}", pattern.confidence),
            pattern.description.dimmed()
        );
    }
    println!();
    output::success(&format!(
        "{} pattern types across {} detections",
        best.len(),
        emitted.len()
    ));
    0
}
