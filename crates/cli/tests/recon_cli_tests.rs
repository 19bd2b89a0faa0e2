// Integration tests for `folio recon`: --json stdout contract and exit codes.
//
// Run with: cargo test -p folio-cli --test recon_cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const CONFIG: &str = r#"
name = "Ward Manual"

[inputs]
source = "source.json"
target = "target.json"
"#;

const SOURCE: &str = r#"{
  "chapters": [
    {
      "id": "ch01",
      "elements": [
        { "kind": "heading", "native_id": "ch01-h1", "title": "Hand Hygiene" },
        { "kind": "section", "native_id": "src-2", "title": "Isolation Precautions", "content_sample": "Contact droplet and airborne precautions" }
      ],
      "floating": [
        { "native_id": "src-t3", "cells": ["Gown", "Gloves"], "number": "3" }
      ]
    }
  ]
}"#;

const TARGET: &str = r#"{
  "chapters": [
    {
      "id": "ch01",
      "elements": [
        { "kind": "heading", "native_id": "ch01-h1", "title": "Hand Hygiene" },
        { "kind": "section", "native_id": "ch01-s2", "title": "Isolation Precautions", "content_sample": "Contact droplet and airborne precautions" }
      ],
      "anchors": [
        { "id": "ch01-p4", "text": "Table 3 lists the protective equipment required for each precaution level.", "order_index": 4 }
      ]
    }
  ]
}"#;

fn folio() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_folio"));
    cmd.env_remove("FOLIO_LOG");
    cmd
}

/// Temp dir holding a config plus source/target documents.
fn workspace(config: &str, source: &str, target: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("handbook.recon.toml"), config).unwrap();
    std::fs::write(dir.path().join("source.json"), source).unwrap();
    std::fs::write(dir.path().join("target.json"), target).unwrap();
    dir
}

fn config_path(dir: &TempDir) -> String {
    dir.path().join("handbook.recon.toml").to_string_lossy().into_owned()
}

fn run(dir: &TempDir, extra: &[&str]) -> Output {
    let config = config_path(dir);
    let mut args = vec!["recon", "run", config.as_str()];
    args.extend_from_slice(extra);
    folio().args(&args).output().expect("folio recon run")
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(stdout: &str) -> serde_json::Value {
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be valid JSON.\nParse error: {e}\nstdout:\n{trimmed}"))
}

// ===========================================================================
// folio recon run
// ===========================================================================

#[test]
fn run_json_produces_result() {
    let dir = workspace(CONFIG, SOURCE, TARGET);
    let output = run(&dir, &["--json"]);
    assert_eq!(code(&output), 0, "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["meta"]["config_name"], "Ward Manual");
    assert_eq!(val["summary"]["references"], 2);
    assert_eq!(val["summary"]["resolved_exact"], 1);
    assert_eq!(val["summary"]["resolved_fuzzy"], 1);
    assert_eq!(val["summary"]["placed"], 1);

    let chapter = &val["chapters"][0];
    assert_eq!(chapter["resolutions"][1]["resolved_id"], "ch01-s2");
    assert_eq!(chapter["placements"][0]["anchor"]["id"], "ch01-p4");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("recon 'Ward Manual'"), "stderr: {stderr}");
}

#[test]
fn run_without_json_keeps_stdout_empty() {
    let dir = workspace(CONFIG, SOURCE, TARGET);
    let output = run(&dir, &[]);
    assert_eq!(code(&output), 0);
    assert!(output.stdout.is_empty());
}

#[test]
fn logs_never_reach_stdout() {
    let dir = workspace(CONFIG, SOURCE, TARGET);
    let config = config_path(&dir);
    let output = folio()
        .env("FOLIO_LOG", "debug")
        .args(["recon", "run", config.as_str(), "--json"])
        .output()
        .unwrap();
    assert_eq!(code(&output), 0);
    assert_single_json(&String::from_utf8_lossy(&output.stdout));
}

#[test]
fn output_file_is_written() {
    let dir = workspace(CONFIG, SOURCE, TARGET);
    let out = dir.path().join("result.json");
    let output = run(&dir, &["--output", out.to_str().unwrap()]);
    assert_eq!(code(&output), 0);

    let written = std::fs::read_to_string(&out).unwrap();
    let val: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(val["summary"]["chapters"], 1);
}

#[test]
fn strict_fails_when_items_need_review() {
    let target = TARGET.replace("Table 3 lists", "Gowning order is listed in");
    let dir = workspace(CONFIG, SOURCE, &target);

    let lenient = run(&dir, &["--json"]);
    assert_eq!(code(&lenient), 0);
    let val = assert_single_json(&String::from_utf8_lossy(&lenient.stdout));
    assert_eq!(val["summary"]["fallback_placed"], 1);

    let strict = run(&dir, &["--json", "--strict"]);
    assert_eq!(code(&strict), 5);
    // The decision set is still printed for auditing.
    assert_single_json(&String::from_utf8_lossy(&strict.stdout));
    assert!(String::from_utf8_lossy(&strict.stderr).contains("need review"));
}

#[test]
fn strict_passes_on_clean_run() {
    let dir = workspace(CONFIG, SOURCE, TARGET);
    assert_eq!(code(&run(&dir, &["--strict"])), 0);
}

#[test]
fn threshold_override_changes_outcome() {
    let dir = workspace(CONFIG, SOURCE, TARGET);
    let output = run(&dir, &["--json", "--resolution", "1.0", "--tie-margin", "0.0"]);
    assert_eq!(code(&output), 0);
    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    // Identical sections still score 1.0, so the fuzzy match survives.
    assert_eq!(val["summary"]["resolved_fuzzy"], 1);
}

#[test]
fn invalid_override_is_a_config_error() {
    let dir = workspace(CONFIG, SOURCE, TARGET);
    let output = run(&dir, &["--resolution", "1.5"]);
    assert_eq!(code(&output), 3);
    assert!(output.stdout.is_empty());
}

#[test]
fn explicit_documents_override_config_inputs() {
    let dir = workspace("name = \"No Inputs\"\n", SOURCE, TARGET);
    let source = dir.path().join("source.json");
    let target = dir.path().join("target.json");
    let output = run(
        &dir,
        &["--json", "--source", source.to_str().unwrap(), "--target", target.to_str().unwrap()],
    );
    assert_eq!(code(&output), 0, "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn missing_documents_is_a_usage_error() {
    let dir = workspace("name = \"No Inputs\"\n", SOURCE, TARGET);
    let output = run(&dir, &[]);
    assert_eq!(code(&output), 2);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no source document given"), "stderr: {stderr}");
    assert!(stderr.contains("hint:"));
}

#[test]
fn undecodable_document_is_a_runtime_error() {
    let dir = workspace(CONFIG, "{ not json", TARGET);
    let output = run(&dir, &["--json"]);
    assert_eq!(code(&output), 4);
    assert!(output.stdout.is_empty());
}

#[test]
fn duplicate_chapter_ids_are_a_runtime_error() {
    let doubled = r#"{ "chapters": [ { "id": "ch01" }, { "id": "ch01" } ] }"#;
    let dir = workspace(CONFIG, SOURCE, doubled);
    let output = run(&dir, &[]);
    assert_eq!(code(&output), 4);
    assert!(String::from_utf8_lossy(&output.stderr).contains("duplicate chapter id"));
}

#[test]
fn missing_config_file_is_a_runtime_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.recon.toml");
    let output = folio()
        .args(["recon", "run", missing.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(code(&output), 4);
}

// ===========================================================================
// folio recon validate
// ===========================================================================

fn validate(config: &str) -> Output {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("check.recon.toml");
    std::fs::write(&path, config).unwrap();
    validate_path(&path)
}

fn validate_path(path: &Path) -> Output {
    folio()
        .args(["recon", "validate", path.to_str().unwrap()])
        .output()
        .expect("folio recon validate")
}

#[test]
fn validate_accepts_defaults() {
    let output = validate("");
    assert_eq!(code(&output), 0);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config ok"), "stderr: {stderr}");
    assert!(stderr.contains("resolution 0.7"));
}

#[test]
fn validate_rejects_out_of_range_threshold() {
    let output = validate("[thresholds]\nresolution = 2.0\n");
    assert_eq!(code(&output), 3);
    assert!(String::from_utf8_lossy(&output.stderr).contains("thresholds.resolution"));
}

#[test]
fn validate_rejects_malformed_toml() {
    let output = validate("[thresholds\nresolution = ");
    assert_eq!(code(&output), 3);
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let output = folio().args(["recon", "frobnicate"]).output().unwrap();
    assert_eq!(code(&output), 2);
}
