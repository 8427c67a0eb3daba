#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use assert_cmd::Command;
use causa_core::{BranchOptions, CausalStore, ManualClock, StoreOptions};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const START_MS: u64 = 1_700_000_000_000;

pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn causa(&self) -> Command {
        let mut cmd = Command::cargo_bin("causa").unwrap();
        cmd.current_dir(self.dir.path());
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn write_store(&self, name: &str, store: &CausalStore<Value>) -> PathBuf {
        self.write(name, &store.export_history().unwrap())
    }
}

fn clocked(key: &str, initial: Value) -> (CausalStore<Value>, ManualClock) {
    let clock = ManualClock::new(START_MS);
    let store = CausalStore::with_options(key, initial, StoreOptions::with_clock(Arc::new(clock.clone())));
    (store, clock)
}

/// Counter written at +100, +200, +300 ms, then forked into "what-if"
/// which diverges at +400 ms.
pub fn counter_with_branch() -> CausalStore<Value> {
    let (mut store, clock) = clocked("counter", json!(0));
    for n in 1..=3 {
        clock.advance(100);
        store.set(json!(n));
    }
    clock.advance(50);
    let what_if = store.branch("what-if", BranchOptions::default()).unwrap();
    store.switch_branch(&what_if).unwrap();
    clock.advance(50);
    store.set(json!(100));
    store
}

/// A value that never changes.
pub fn flat(key: &str, writes: usize) -> CausalStore<Value> {
    let (mut store, clock) = clocked(key, json!(1));
    for _ in 0..writes {
        clock.advance(100);
        store.set(json!(1));
    }
    store
}

/// A value that changes every write.
pub fn noisy(key: &str, writes: usize) -> CausalStore<Value> {
    let (mut store, clock) = clocked(key, json!(0));
    for n in 0..writes {
        clock.advance(100);
        store.set(json!(n * 3 + 1));
    }
    store
}
