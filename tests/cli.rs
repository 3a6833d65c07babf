//! Exercises the `treestats` binary end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use treestats::graph::NetGraphBuilder;
use treestats::net_disk::NetDisk;

fn treestats() -> Command {
    let mut command = Command::cargo_bin("treestats").unwrap();
    for key in [
        "TREESTATS_LOG_LEVEL",
        "TREESTATS_JSON_LOGS",
        "TREESTATS_PARALLEL",
        "TREESTATS_THREADS",
        "TREESTATS_DEGENERATE_POLICY",
        "RUST_LOG",
    ] {
        command.env_remove(key);
    }
    command
}

fn disk(dir: &TempDir) -> std::path::PathBuf {
    let mut builder = NetGraphBuilder::new();
    let root = builder.add_net("0");
    builder.add_atom(root, 10, 1);
    builder.add_pairing(root, 0, 9);
    for name in ["1", "2"] {
        let leaf = builder.add_net(name);
        builder.nest(root, leaf);
        builder.add_pairing(leaf, 0, 5);
    }
    let store = dir.path().join("disk");
    NetDisk::save(&builder.build().unwrap(), &store).unwrap();
    store
}

#[test]
fn help_flag_works() {
    treestats()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--netDisk"))
        .stdout(predicate::str::contains("--outputFile"));
}

#[test]
fn version_flag_works() {
    treestats()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("treestats"));
}

#[test]
fn unknown_flag_prints_usage() {
    treestats()
        .arg("--frobnicate")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn missing_arguments_fail() {
    let dir = TempDir::new().unwrap();
    treestats()
        .args(["-c", dir.path().to_str().unwrap(), "-d", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--outputFile"));
}

#[test]
fn computes_tree_stats() {
    let dir = TempDir::new().unwrap();
    let store = disk(&dir);
    let output = dir.path().join("stats.tsv");

    treestats()
        .arg("-c")
        .arg(&store)
        .args(["-d", "0", "-a", "DEBUG"])
        .arg("-e")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Parsed the top level net"));

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("total_p\ttotal_q\tentropy\n"));
    assert!(text.lines().last().unwrap().starts_with("57.219281\t24.000000\t33.219281"));
}

#[test]
fn parallel_run_writes_same_row() {
    let dir = TempDir::new().unwrap();
    let store = disk(&dir);
    let sequential = dir.path().join("sequential.json");
    let parallel = dir.path().join("parallel.json");

    for (path, extra) in [(&sequential, vec![]), (&parallel, vec!["--parallel", "--threads", "2"])] {
        treestats()
            .arg("--netDisk")
            .arg(&store)
            .args(["--netName", "0", "--logLevel", "error"])
            .arg("--outputFile")
            .arg(path)
            .args(extra)
            .assert()
            .success();
    }

    let read = |path: &std::path::Path| {
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        value["relative_entropy"].clone()
    };
    assert_eq!(read(&sequential), read(&parallel));
}

#[test]
fn unknown_net_fails() {
    let dir = TempDir::new().unwrap();
    let store = disk(&dir);
    let output = dir.path().join("stats.tsv");

    treestats()
        .arg("-c")
        .arg(&store)
        .args(["-d", "42"])
        .arg("-e")
        .arg(&output)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("net '42' not found"));
    assert!(!output.exists());
}

#[test]
fn invalid_thread_count_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = disk(&dir);

    treestats()
        .arg("-c")
        .arg(&store)
        .args(["-d", "0", "--threads", "1000"])
        .arg("-e")
        .arg(dir.path().join("stats.tsv"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"));
}
