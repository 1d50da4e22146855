//! CLI integration tests for t2m
//!
//! These only exercise paths that never reach the network.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
    ledger_path: PathBuf,
}

/// Config with a bearer token file and an empty ledger location
fn setup_test_env() -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let ledger_path = temp_dir.path().join("data").join("db.json");
    let token_path = temp_dir.path().join("twitter.token");
    let credentials_dir = temp_dir.path().join("mastodon");

    fs::write(&token_path, "test-bearer-token\n").unwrap();
    fs::write(
        &config_path,
        format!(
            r#"
[ledger]
path = "{}"

[twitter]
bearer_token_file = "{}"
api_base = "http://127.0.0.1:9"

[mastodon]
credentials_dir = "{}"
"#,
            escape_path_for_toml(&ledger_path.to_string_lossy()),
            escape_path_for_toml(&token_path.to_string_lossy()),
            escape_path_for_toml(&credentials_dir.to_string_lossy()),
        ),
    )
    .unwrap();

    TestEnv {
        _temp_dir: temp_dir,
        config_path,
        ledger_path,
    }
}

fn t2m(env: &TestEnv) -> Command {
    let mut cmd = Command::cargo_bin("t2m").unwrap();
    cmd.env_remove("T2M_CONFIG")
        .env_remove("T2M_LEDGER")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&env.config_path);
    cmd
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("t2m").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Forward tweets to Mastodon"))
        .stdout(predicate::str::contains("one"))
        .stdout(predicate::str::contains("all"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_one_help_lists_options() {
    let mut cmd = Command::cargo_bin("t2m").unwrap();

    cmd.args(["one", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--mastodon-handle"))
        .stdout(predicate::str::contains("--number"))
        .stdout(predicate::str::contains("--only-mark-as-seen"))
        .stdout(predicate::str::contains("--retweets"))
        .stdout(predicate::str::contains("--debug"))
        .stdout(predicate::str::contains("--wait"))
        .stdout(predicate::str::contains("--strip-trailing-url"));
}

#[test]
fn test_add_then_list() {
    let env = setup_test_env();

    t2m(&env)
        .args(["add", "tw1", "a1@mamot.fr"])
        .assert()
        .success()
        .stdout(predicate::str::contains("done"));

    assert!(env.ledger_path.exists());

    t2m(&env)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(" * tw1 -> a1@mamot.fr (0 forwarded)"));
}

#[test]
fn test_list_json_output() {
    let env = setup_test_env();
    fs::create_dir_all(env.ledger_path.parent().unwrap()).unwrap();
    fs::write(
        &env.ledger_path,
        r#"{"tw1": {"mastodon": "a1@mamot.fr", "done": [1, 4]}, "tw2": {"done": [3]}}"#,
    )
    .unwrap();

    let output = t2m(&env)
        .args(["--format", "json", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let links: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(links[0]["source"], "tw1");
    assert_eq!(links[0]["destination"], "a1@mamot.fr");
    assert_eq!(links[0]["forwarded"], 2);
    assert_eq!(links[1]["source"], "tw2");
    assert!(links[1]["destination"].is_null());
}

#[test]
fn test_add_malformed_destination() {
    let env = setup_test_env();

    t2m(&env)
        .args(["add", "tw1", "a1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("t2m add tw1 a1@theinstance.com"));

    assert!(!env.ledger_path.exists());
}

#[test]
fn test_one_without_link() {
    let env = setup_test_env();

    t2m(&env)
        .args(["one", "tw1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "No associated mastodon account for twitter account 'tw1'",
        ));
}

#[test]
fn test_one_with_malformed_destination() {
    let env = setup_test_env();

    t2m(&env)
        .args(["one", "tw1", "-m", "a1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("needs the instance name"));
}

#[test]
fn test_all_with_malformed_recorded_destination() {
    let env = setup_test_env();
    fs::create_dir_all(env.ledger_path.parent().unwrap()).unwrap();
    fs::write(&env.ledger_path, r#"{"tw1": {"mastodon": "alice", "done": [3]}}"#).unwrap();

    t2m(&env)
        .arg("all")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("needs the instance name"))
        .stderr(predicate::str::contains("t2m add tw1 alice@theinstance.com"));
}

#[test]
fn test_invalid_output_format() {
    let env = setup_test_env();

    t2m(&env)
        .args(["--format", "xml", "list"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_invalid_wait_duration() {
    let env = setup_test_env();

    t2m(&env)
        .args(["all", "--wait", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid duration"));
}

#[test]
fn test_corrupted_ledger_is_an_error() {
    let env = setup_test_env();
    fs::create_dir_all(env.ledger_path.parent().unwrap()).unwrap();
    fs::write(&env.ledger_path, "{not json").unwrap();

    t2m(&env)
        .arg("list")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Ledger error"));

    assert_eq!(fs::read_to_string(&env.ledger_path).unwrap(), "{not json");
}

#[test]
fn test_ledger_flag_overrides_config() {
    let env = setup_test_env();
    let other = env.config_path.with_file_name("other.json");

    t2m(&env)
        .arg("--ledger")
        .arg(&other)
        .args(["add", "tw9", "a9@mamot.fr"])
        .assert()
        .success();

    assert!(other.exists());
    assert!(!env.ledger_path.exists());
}

#[test]
fn test_missing_explicit_config() {
    let mut cmd = Command::cargo_bin("t2m").unwrap();

    cmd.env_remove("T2M_CONFIG")
        .args(["--config", "/nonexistent/t2m/config.toml", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_one_without_bearer_token() {
    let env = setup_test_env();
    fs::remove_file(env.config_path.with_file_name("twitter.token")).unwrap();

    t2m(&env)
        .args(["one", "tw1", "-m", "a1@mamot.fr"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Twitter client"));
}
