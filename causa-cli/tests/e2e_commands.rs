//! End-to-end tests for the `causa` binary.
//!
//! Histories are produced with causa-core on a manual clock, exported to a
//! temp directory and read back through the CLI.

mod common;
use common::{counter_with_branch, flat, noisy, TestEnv, START_MS};
use predicates::prelude::*;
use serde_json::Value;

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_help_lists_commands() {
    let env = TestEnv::new();
    env.causa()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("replay"));
}

#[test]
fn test_inspect_json() {
    let env = TestEnv::new();
    let file = env.write_store("counter.json", &counter_with_branch());

    let output = env.causa().arg("inspect").arg(&file).arg("--json").output().unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["stats"]["storeKey"], "counter");
    assert_eq!(json["stats"]["totalEvents"], 6);
    assert_eq!(json["stats"]["universes"], 2);
    assert_eq!(json["stats"]["currentUniverse"], "main");
    assert_eq!(json["value"], 3);
}

#[test]
fn test_inspect_named_universe() {
    let env = TestEnv::new();
    let file = env.write_store("counter.json", &counter_with_branch());

    env.causa()
        .args(["inspect", "--universe", "what-if"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("100"));

    env.causa()
        .args(["inspect", "--universe", "nowhere"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown universe 'nowhere'"));
}

#[test]
fn test_branches_json() {
    let env = TestEnv::new();
    let file = env.write_store("counter.json", &counter_with_branch());

    let output = env.causa().arg("branches").arg(&file).arg("--json").output().unwrap();
    assert!(output.status.success());
    let branches = stdout_json(&output);
    let names: Vec<&str> = branches
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["main", "what-if"]);
    assert_eq!(branches[1]["parentUniverse"], "main");
}

#[test]
fn test_at_timestamp() {
    let env = TestEnv::new();
    let file = env.write_store("counter.json", &counter_with_branch());

    let output = env
        .causa()
        .arg("at")
        .arg(&file)
        .arg("--timestamp")
        .arg((START_MS + 150).to_string())
        .arg("--json")
        .output()
        .unwrap();
    let json = stdout_json(&output);
    assert_eq!(json["found"], true);
    assert_eq!(json["value"], 1);

    let output = env
        .causa()
        .arg("at")
        .arg(&file)
        .arg("--timestamp")
        .arg((START_MS - 1).to_string())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["found"], false);

    env.causa()
        .arg("at")
        .arg(&file)
        .args(["--universe", "what-if", "--timestamp"])
        .arg((START_MS + 1_000).to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("100"));
}

#[test]
fn test_at_unknown_event() {
    let env = TestEnv::new();
    let file = env.write_store("counter.json", &counter_with_branch());

    env.causa()
        .arg("at")
        .arg(&file)
        .args(["--event", "no-such-event"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown event 'no-such-event'"));
}

#[test]
fn test_entropy_against_baseline() {
    let env = TestEnv::new();
    let calm = env.write_store("calm.json", &flat("sensor", 8));
    let wild = env.write_store("wild.json", &noisy("sensor", 8));

    let output = env
        .causa()
        .arg("entropy")
        .arg(&wild)
        .arg("--baseline")
        .arg(&calm)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["baseline"]["shannon"], 0.0);
    assert!(json["entropy"]["shannon"].as_f64().unwrap() > 2.0);
    assert_eq!(json["anomaly"]["isAnomaly"], true);

    env.causa()
        .arg("entropy")
        .arg(&wild)
        .arg("--baseline")
        .arg(&calm)
        .arg("--fail-on-anomaly")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Anomaly"));

    env.causa()
        .arg("entropy")
        .arg(&calm)
        .arg("--baseline")
        .arg(&calm)
        .arg("--fail-on-anomaly")
        .assert()
        .success();
}

#[test]
fn test_replay_finds_synchronization() {
    let env = TestEnv::new();
    let a = env.write_store("a.json", &noisy("alpha", 10));
    let b = env.write_store("b.json", &noisy("beta", 10));

    let output = env
        .causa()
        .arg("replay")
        .arg(&a)
        .arg(&b)
        .args(["--bucket-ms", "100", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ticks"], 11);
    let patterns = json["patterns"].as_array().unwrap();
    assert!(!patterns.is_empty());
    assert!(patterns.iter().all(|p| p["type"] == "synchronization"));
    assert_eq!(patterns[0]["storesInvolved"], serde_json::json!(["alpha", "beta"]));
}

#[test]
fn test_replay_respects_config() {
    let env = TestEnv::new();
    let a = env.write_store("a.json", &noisy("alpha", 10));
    let b = env.write_store("b.json", &noisy("beta", 10));
    let config = env.write("causa.toml", "[emergence]\nenabled = [\"cascade\"]\n");

    let output = env
        .causa()
        .arg("--config")
        .arg(&config)
        .arg("replay")
        .arg(&a)
        .arg(&b)
        .args(["--bucket-ms", "100", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["patterns"], serde_json::json!([]));
}

#[test]
fn test_replay_rejects_duplicate_stores() {
    let env = TestEnv::new();
    let a = env.write_store("a.json", &noisy("alpha", 3));
    let again = env.write_store("again.json", &noisy("alpha", 3));

    env.causa()
        .arg("replay")
        .arg(&a)
        .arg(&again)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Store already observed: alpha"));
}

#[test]
fn test_bad_inputs_fail_cleanly() {
    let env = TestEnv::new();
    let junk = env.write("junk.json", "{ not json");
    let empty = env.write("empty.json", "[]");
    let bad_config = env.write("bad.toml", "[anomaly]\nrelative_threshold = 0.0\n");

    env.causa()
        .arg("inspect")
        .arg(&junk)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not an exported history"));

    env.causa()
        .arg("inspect")
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("contains no events"));

    env.causa()
        .arg("--config")
        .arg(&bad_config)
        .arg("inspect")
        .arg(&junk)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}
