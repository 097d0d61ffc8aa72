use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::{fs, path::Path, process::Command};
use tempfile::tempdir;

fn f2s() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("f2s"));
    cmd.env_remove("RUST_LOG").env_remove("F2S_STUB_NODES");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn create_stub_nodes(store: &Path) {
    f2s()
        .args(["nodes", "1", "2", "--stub", "--store"])
        .arg(store)
        .assert()
        .success()
        .stdout(predicate::str::contains("created  node1"));
}

#[test]
fn doctor_accepts_the_library() {
    f2s()
        .args(["doctor", "--library", "fixtures/library"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("OK  fixtures/library (10 tasks"));
}

#[test]
fn doctor_json_reports_counts() {
    let output = f2s()
        .args(["doctor", "--graph", "fixtures/serialized_tasks.yaml", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], Value::Bool(true));
    assert_eq!(json["tasks"], Value::from(8));
}

#[test]
fn doctor_flags_dangling_references() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("tasks.yaml"),
        "- id: netconfig\n  type: shell\n  requires: [globals]\n  parameters: {cmd: ifup -a}\n",
    )
    .unwrap();

    f2s()
        .arg("doctor")
        .arg("--library")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("dangling_reference: 'globals'"));

    let output = f2s()
        .arg("doctor")
        .arg("--library")
        .arg(dir.path())
        .arg("--json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["ok"], Value::Bool(false));
    assert!(json["errors"].as_array().is_some_and(|e| !e.is_empty()));
}

#[test]
fn order_lists_dependencies_first() {
    let output = f2s()
        .args(["order", "--graph", "fixtures/serialized_tasks.yaml"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 8);
    assert_eq!(lines.first(), Some(&"deploy_start"));
    assert_eq!(lines.last(), Some(&"deploy_end"));
}

#[test]
fn assign_after_nodes_is_clean() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store.yaml");
    create_stub_nodes(&store);

    let output = f2s()
        .args([
            "assign",
            "1",
            "null",
            "1,2",
            "--graph",
            "fixtures/serialized_tasks.yaml",
            "--json",
            "--store",
        ])
        .arg(&store)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(json["ok"], Value::Bool(true));
    assert_eq!(json["report"]["created"].as_array().map(Vec::len), Some(8));
    assert_eq!(json["report"]["events"].as_array().map(Vec::len), Some(18));

    let snapshot = fs::read_to_string(&store).unwrap();
    assert!(snapshot.contains("compute_setup_2"));
}

#[test]
fn assign_without_nodes_fails_but_keeps_progress() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store.yaml");

    f2s()
        .args(["assign", "1", "null", "1", "2"])
        .args(["--graph", "fixtures/serialized_tasks.yaml", "--store"])
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAIL ownership hiera_1"));

    let snapshot = fs::read_to_string(&store).unwrap();
    assert!(snapshot.contains("netconfig_1"));
}

#[test]
fn t2r_preview_renders_puppet_metadata() {
    f2s()
        .args(["t2r", "database", "--library", "fixtures/library", "--preview"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--- database"))
        .stdout(predicate::str::contains("handler: puppetv2"))
        .stdout(predicate::str::contains("database.pp"));
}

#[test]
fn t2r_writes_meta_files() {
    let dir = tempdir().unwrap();
    f2s()
        .args(["t2r", "--library", "fixtures/library", "--out"])
        .arg(dir.path())
        .assert()
        .success();
    assert!(dir.path().join("netconfig").join("meta.yaml").exists());
    assert!(dir.path().join("deploy_end").join("meta.yaml").exists());
    assert!(!dir.path().join("compute").exists());
}

#[test]
fn g2vr_writes_compositions() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("vrs");
    f2s()
        .args(["g2vr", "--library", "fixtures/library", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("6 compositions, 2 collections"));
    assert!(out.join("vr_top-role-compute.yaml").exists());
    assert!(out.join("role_primary-controller.yaml").exists());
}

#[test]
fn missing_graph_file_is_an_error() {
    f2s()
        .args(["order", "--graph", "fixtures/nope.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));
}

#[test]
fn inventory_drives_nodes_roles_and_master() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store.yaml");
    let inventory = ["--nodes", "fixtures/nodes.yaml", "--store"];

    f2s()
        .args(["nodes", "1", "2"])
        .args(inventory)
        .arg(&store)
        .assert()
        .success();

    let output = f2s()
        .args(["roles", "1", "2", "--json"])
        .args(inventory)
        .arg(&store)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(
        json["report"]["created"],
        serde_json::json!(["primary-controller_1", "compute_2", "cinder_2"])
    );

    f2s()
        .args(["master", "1"])
        .args(inventory)
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("created  genkeys"));

    let snapshot = fs::read_to_string(&store).unwrap();
    assert!(snapshot.contains("nodemaster"));
    assert!(snapshot.contains("10.20.0.2"));
}

#[test]
fn prep_then_prefetch_merges_inventory_facts() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store.yaml");
    let inventory = ["--nodes", "fixtures/nodes.yaml", "--store"];

    f2s()
        .args(["nodes", "1"])
        .args(inventory)
        .arg(&store)
        .assert()
        .success();
    f2s()
        .args(["prep", "1", "1", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("created  fuel_data1"));

    f2s()
        .args(["prefetch", "1", "1"])
        .args(inventory)
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("updated  fuel_data1"));

    let snapshot = fs::read_to_string(&store).unwrap();
    assert!(snapshot.contains("node-1.test.domain.local"));
    assert!(snapshot.contains("ha_compact"));
}

#[test]
fn prep_with_facts_reports_both_steps() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store.yaml");
    create_stub_nodes(&store);

    let output = f2s()
        .args(["prep", "1", "1", "2", "--facts", "--stub", "--json", "--store"])
        .arg(&store)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(
        json["report"]["created"],
        serde_json::json!(["fuel_data1", "fuel_data2"])
    );
    assert_eq!(
        json["report"]["updated"],
        serde_json::json!(["fuel_data1", "fuel_data2"])
    );
}
