use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_zagent_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("zagent")
}

#[test]
fn test_doctor_json_without_browser() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(get_zagent_bin())
        .current_dir(dir.path())
        .env_remove("ZENDESK_CONFIG")
        .env_remove("ZENDESK_DOMAIN")
        .env_remove("ZENDESK_CDP_URL")
        .args(["doctor", "--json", "--cdp-url", "http://127.0.0.1:9"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["ok"], false);
    assert_eq!(payload["command"], "doctor");

    let checks = payload["checks"].as_array().unwrap();
    let names: Vec<_> = checks.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["config-file", "config-contract", "profile-dir", "cdp", "zendesk-auth"]
    );
    assert_eq!(checks[3]["ok"], false);
    assert_eq!(checks[4]["detail"], "Missing domain");
}

#[test]
fn test_doctor_text_output() {
    let dir = tempfile::tempdir().unwrap();
    Command::new(get_zagent_bin())
        .current_dir(dir.path())
        .env_remove("ZENDESK_CONFIG")
        .env_remove("ZENDESK_DOMAIN")
        .env_remove("ZENDESK_JSON")
        .args(["doctor", "--domain", "acme.zendesk.com", "--cdp-url", "http://127.0.0.1:9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cdp"))
        .stdout(predicate::str::contains("Skipped because CDP is unreachable"));
}
