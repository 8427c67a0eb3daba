//! Terminal output formatting.
//!
//! Status lines go to stdout, errors to stderr. `--json` output bypasses
//! all of this and goes through [`json`].

use std::fmt::Display;

use colored::{ColoredString, Colorize};
use serde::Serialize;

/// Width keys are padded to in [`kv`] rows.
const KEY_WIDTH: usize = 18;

fn status(marker: ColoredString, msg: ColoredString) {
    println!("{} {}", marker, msg);
}

pub fn success(msg: &str) {
    status("✓".green().bold(), msg.green());
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg.red());
}

pub fn info(msg: &str) {
    status("•".cyan(), msg.normal());
}

pub fn warn(msg: &str) {
    status("!".yellow().bold(), msg.yellow());
}

/// Section title, underlined to its own width.
pub fn header(title: &str) {
    let rule = "═".repeat(title.chars().count());
    println!("\n{}\n{}", title.bold(), rule.dimmed());
}

/// Aligned `key  value` row.
pub fn kv(key: &str, value: impl Display) {
    let key = format!("{:<width$}", key, width = KEY_WIDTH);
    println!("  {} {}", key.dimmed(), value);
}

/// Suggested next step, printed after the main output.
pub fn hint(msg: &str) {
    status("hint:".dimmed(), msg.dimmed());
}

/// Print `value` as pretty JSON and return the exit code.
pub fn json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            error(&format!("Failed to render JSON: {}", e));
            1
        }
    }
}

/// Compact one-line rendering of a stored value.
pub fn value(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unrenderable>".to_string())
}
