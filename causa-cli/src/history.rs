//! Loading exported histories.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use causa_core::{CausalEvent, CausalStore};

/// Rebuilds a store from a file written by `export_history`.
///
/// The store key is taken from the first event.
pub async fn load_store(path: &Path) -> Result<CausalStore<Value>, String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    let events: Vec<CausalEvent<Value>> = serde_json::from_str(&text)
        .map_err(|e| format!("{} is not an exported history: {}", path.display(), e))?;

    let key = match events.first() {
        Some(first) => first.store_key.clone(),
        None => return Err(format!("{} contains no events", path.display())),
    };

    let mut store = CausalStore::new(key, Value::Null);
    store
        .import_events(events)
        .map_err(|e| format!("{} was rejected: {}", path.display(), e))?;
    debug!("Loaded store '{}' from {}", store.key(), path.display());
    Ok(store)
}

/// Moves `store` to the universe named by id or branch name.
pub fn select_universe(store: &mut CausalStore<Value>, universe: &str) -> Result<(), String> {
    let id = store
        .list_branches()
        .iter()
        .find(|b| b.id == universe || b.name == universe)
        .map(|b| b.id.clone())
        .ok_or_else(|| format!("Unknown universe '{}' in store '{}'", universe, store.key()))?;
    store.switch_branch(&id).map_err(|e| e.to_string())
}
