use predicates::prelude::*;

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const RULES: &str = r#"[
    {"rule_id": "1", "pattern": "select", "action": "block", "phase": 1, "priority": 1, "category": "sqli"},
    {"rule_id": "2", "pattern": "select", "action": "block", "phase": 1, "priority": 2, "category": "sqli"},
    {"rule_id": 3, "pattern": "<script", "action": "log", "flags": "i"}
]"#;

const TRAFFIC: &str = r#"[
    {"transaction_id": "t1", "request_uri": "/a?q=select"},
    {"transaction_id": "t2", "request_uri": "/b?q=select", "user_agent": "curl"},
    {"transaction_id": "t3", "request_uri": "/c", "matched_data": "<SCRIPT>alert(1)"},
    {"transaction_id": "t4", "request_uri": "/d"}
]"#;

fn write_inputs(dir: &TempDir, rules: &str, traffic: &str) -> (PathBuf, PathBuf) {
    let rules_path = dir.path().join("rules.json");
    let traffic_path = dir.path().join("traffic.json");
    fs::write(&rules_path, rules).unwrap();
    fs::write(&traffic_path, traffic).unwrap();
    (rules_path, traffic_path)
}

fn cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo_bin_cmd!("rulemesh");
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

/// Test that the binary runs and shows help
#[test]
fn test_help_command() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WAF rules"));
}

/// Test that the binary shows version
#[test]
fn test_version_command() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rulemesh"));
}

#[test]
fn test_analyze_nonexistent_file() {
    cmd()
        .args(["analyze", "/nonexistent/rules.json", "/nonexistent/traffic.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read rules"));
}

#[test]
fn test_analyze_terminal_output() {
    let dir = TempDir::new().unwrap();
    let (rules, traffic) = write_inputs(&dir, RULES, TRAFFIC);

    cmd()
        .args(["analyze", rules.to_str().unwrap(), traffic.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("[SHD] 1 → 2"))
        .stdout(predicate::str::contains("Remove/Review Shadowed Rules"))
        .stderr(predicate::str::contains("Loaded 3 rules and 4 transactions"));
}

#[test]
fn test_analyze_json_output() {
    let dir = TempDir::new().unwrap();
    let (rules, traffic) = write_inputs(&dir, RULES, TRAFFIC);

    let output = cmd()
        .args(["-f", "json", "analyze", rules.to_str().unwrap(), traffic.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total_rules"], 3);
    let shd = &report["relationships_by_type"]["SHD"][0];
    assert_eq!(shd["rule_a"], "1");
    assert_eq!(shd["rule_b"], "2");
    assert_eq!(shd["confidence"], 1.0);
    assert_eq!(shd["conflicting_fields"]["category"], "Both category: sqli");
    assert_eq!(report["hit_counts"]["3"], 1);
    assert_eq!(report["enrichment"]["enricher"], "none");
}

#[test]
fn test_analyze_type_filter() {
    let dir = TempDir::new().unwrap();
    let (rules, traffic) = write_inputs(&dir, RULES, TRAFFIC);

    let output = cmd()
        .args([
            "analyze",
            rules.to_str().unwrap(),
            traffic.to_str().unwrap(),
            "--types",
            "rxd,bogus",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["per_type_counts"]["SHD"], 0);
    assert_eq!(report["per_type_counts"]["RXD"], 1);
    assert_eq!(report["total_relationships"], 1);
}

#[test]
fn test_analyze_output_to_file() {
    let dir = TempDir::new().unwrap();
    let (rules, traffic) = write_inputs(&dir, RULES, TRAFFIC);
    let output_path = dir.path().join("report.json");

    cmd()
        .args([
            "-f",
            "json",
            "-o",
            output_path.to_str().unwrap(),
            "analyze",
            rules.to_str().unwrap(),
            traffic.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Results written to"));

    let written = fs::read_to_string(&output_path).unwrap();
    assert!(written.contains("\"relationships_by_type\""));
}

#[test]
fn test_analyze_rejects_invalid_threshold() {
    let dir = TempDir::new().unwrap();
    let (rules, traffic) = write_inputs(&dir, RULES, TRAFFIC);

    cmd()
        .args([
            "analyze",
            rules.to_str().unwrap(),
            traffic.to_str().unwrap(),
            "--containment-threshold",
            "1.5",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("containment_threshold"));
}

#[test]
fn test_analyze_missing_request_uri() {
    let dir = TempDir::new().unwrap();
    let (rules, traffic) = write_inputs(&dir, RULES, r#"[{"transaction_id": "t1"}]"#);

    cmd()
        .args(["analyze", rules.to_str().unwrap(), traffic.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("request_uri"));
}

#[test]
fn test_analyze_duplicate_rule_id() {
    let dir = TempDir::new().unwrap();
    let rules = r#"[
        {"rule_id": "x", "pattern": "a", "action": "log"},
        {"rule_id": "x", "pattern": "b", "action": "log"}
    ]"#;
    let (rules, traffic) = write_inputs(&dir, rules, TRAFFIC);

    cmd()
        .args(["analyze", rules.to_str().unwrap(), traffic.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate rule_id: x"));
}

#[test]
fn test_matrix_terminal_output() {
    let dir = TempDir::new().unwrap();
    let rules = r#"[
        {"rule_id": "ok", "pattern": "select", "action": "block"},
        {"rule_id": "bad", "pattern": "(select", "action": "log"}
    ]"#;
    let (rules, traffic) = write_inputs(&dir, rules, TRAFFIC);

    cmd()
        .args(["matrix", rules.to_str().unwrap(), traffic.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 rules × 4 transactions"))
        .stdout(predicate::str::contains("escaped_literal"));
}

#[test]
fn test_matrix_json_output() {
    let dir = TempDir::new().unwrap();
    let (rules, traffic) = write_inputs(&dir, RULES, TRAFFIC);

    let output = cmd()
        .args(["matrix", rules.to_str().unwrap(), traffic.to_str().unwrap(), "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["rule_id"], "1");
    assert_eq!(rows[0]["hits"], 2);
    assert_eq!(rows[2]["rule_id"], "3");
    assert_eq!(rows[2]["compile_status"], "regex");
}
