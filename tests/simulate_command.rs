use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

fn geoperm() -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("geoperm");
    Command::new(bin)
}

#[test]
fn simulate_command_emits_json_report() {
    let input = Path::new("tests/fixtures/two_tabs.yaml");
    assert!(input.exists(), "fixture missing");

    let assert = geoperm()
        .args([
            "--output",
            "json",
            "--config",
            "tests/fixtures/broker.yaml",
            "simulate",
            input.to_str().unwrap(),
            "--pretty",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(&stdout).expect("valid json");

    assert_eq!(value["name"].as_str(), Some("two tabs sharing an origin"));
    assert_eq!(value["remembered"]["https://a.test"].as_bool(), Some(true));

    let tabs = value["tabs"].as_array().unwrap();
    assert_eq!(tabs.len(), 2);

    let left = &tabs[0];
    assert_eq!(left["prompts"].as_array().unwrap().len(), 1);
    assert_eq!(left["documents"][0]["decisions"], serde_json::json!([true]));

    // right's queued https://a.test was answered by left's remembered decision,
    // then its own denial of https://b.test stayed temporary.
    let right = &tabs[1];
    assert_eq!(right["prompts"], serde_json::json!(["https://b.test"]));
    assert_eq!(right["documents"][0]["decisions"], serde_json::json!([false]));
    assert_eq!(right["documents"][1]["decisions"], serde_json::json!([true]));
    assert_eq!(right["state"]["temporary"]["https://b.test"].as_bool(), Some(false));
    assert!(right["state"]["in_progress"].is_null());
    assert!(right["state"]["queued"].as_array().unwrap().is_empty());

    let events = value["events"].as_array().unwrap();
    assert!(events.iter().any(|event| {
        event["tab"].as_str() == Some("right")
            && event["kind"].as_str() == Some("resolved")
            && event["source"].as_str() == Some("cross_tab")
    }));
}

#[test]
fn simulate_command_prints_metrics() {
    let assert = geoperm()
        .args(["simulate", "tests/fixtures/two_tabs.yaml", "--metrics"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    assert!(stdout.contains("Tab left"));
    assert!(stdout.contains("geoperm_prompts_shown_total"));
}

#[test]
fn simulate_command_rejects_unknown_tab() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        r#"{"tabs": [{"name": "left"}], "steps": [{"action": "reset", "tab": "nope"}]}"#,
    )
    .unwrap();

    geoperm()
        .args(["simulate", path.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn info_command_reports_config() {
    let assert = geoperm()
        .args(["--config", "tests/fixtures/broker.yaml", "--output", "json", "info"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(value["config"]["event_capacity"].as_u64(), Some(64));
    assert_eq!(value["config"]["max_queue_len"].as_u64(), Some(8));
}
