//! Integration tests for CLI commands

#![allow(deprecated)]

use assert_cmd::{assert::OutputAssertExt, cargo::CommandCargoExt};
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("mxb").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("custom"))
        .stdout(predicate::str::contains("describe"));
}

#[test]
fn test_describe_prints_connector_definition() {
    let mut cmd = Command::cargo_bin("mxb").unwrap();
    cmd.arg("describe");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"oauth2\""))
        .stdout(predicate::str::contains("\"autoRefresh\": true"))
        .stdout(predicate::str::contains("Create Custom Record"));
}

#[test]
fn test_describe_output_is_valid_json() {
    let output = Command::cargo_bin("mxb")
        .unwrap()
        .arg("describe")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["creates"][0]["key"], "custom");
    assert_eq!(value["searches"][0]["noun"], "Custom");
}

#[test]
fn test_custom_create_requires_name() {
    let mut cmd = Command::cargo_bin("mxb").unwrap();
    cmd.args(["custom", "create", "--description", "no name"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--name"));
}

#[test]
fn test_config_rejects_unknown_key() {
    let mut cmd = Command::cargo_bin("mxb").unwrap();
    cmd.args(["config", "get", "gemini-model"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_alias_binary_runs() {
    let mut cmd = Command::cargo_bin("maxbridge").unwrap();
    cmd.arg("--version");

    cmd.assert().success().stdout(predicate::str::contains("0.1.0"));
}
