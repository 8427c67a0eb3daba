//! Branches command implementation.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::history::load_store;
use crate::output;

/// Arguments for the branches command.
#[derive(Args)]
pub struct BranchesArgs {
    /// Exported history file (JSON array of events)
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: BranchesArgs) -> i32 {
    let store = match load_store(&args.file).await {
        Ok(s) => s,
        Err(e) => {
            output::error(&e);
            return 1;
        }
    };
    let branches = store.list_branches();

    if args.json {
        return output::json(&branches);
    }

    output::header(&format!("Universes of '{}'", store.key()));
    println!();
    println!(
        "{:<14} {:<40} {:<10} {}",
        "Name".bold(),
        "Id".bold(),
        "Events".bold(),
        "Forked from".bold()
    );
    println!("{}", "─".repeat(90).dimmed());

    for branch in &branches {
        let events = store
            .history()
            .iter()
            .filter(|e| e.universe_id == branch.id)
            .count();
        let origin = match (&branch.parent_universe, &branch.fork_point) {
            (Some(parent), Some(event)) => format!("{} @ {}", parent, event),
            _ => "-".to_string(),
        };
        let name = if branch.id == store.current_universe() {
            format!("{} *", branch.name).green()
        } else {
            branch.name.normal()
        };
        println!(
            "{:<14} {:<40} {:<10} {}",
            name,
            branch.id,
            events,
            origin.dimmed()
        );
    }

    println!();
    output::hint("Use `causa at <FILE> --universe <NAME>` to read a universe.");
    0
}
