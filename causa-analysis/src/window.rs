//! Samples taken by the emergence detector.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// State of every observed store at one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: u64,
    /// Numeric projection of each store's value.
    pub values: BTreeMap<String, Option<f64>>,
    /// Changes per store since the previous tick.
    pub changes: BTreeMap<String, u64>,
    /// Stores that changed since the previous tick, first mover first.
    pub change_order: Vec<String>,
}

impl Snapshot {
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Records one store's sample.
    pub fn with_store(mut self, key: &str, value: Option<f64>, changes: u64) -> Self {
        self.values.insert(key.to_string(), value);
        self.changes.insert(key.to_string(), changes);
        if changes > 0 && !self.change_order.iter().any(|k| k == key) {
            self.change_order.push(key.to_string());
        }
        self
    }

    /// Store that changed first during the interval.
    pub fn first_changer(&self) -> Option<&str> {
        self.change_order.first().map(String::as_str)
    }

    /// Number of stores that changed during the interval.
    pub fn changed_count(&self) -> usize {
        self.changes.values().filter(|&&c| c > 0).count()
    }

    pub fn changes_of(&self, key: &str) -> u64 {
        self.changes.get(key).copied().unwrap_or(0)
    }

    /// Numeric values present in this snapshot.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values.values().filter_map(|v| *v).collect()
    }
}
