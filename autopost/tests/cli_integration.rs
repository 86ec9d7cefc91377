//! CLI integration tests for autopost
//!
//! None of these reach a provider: they cover local storage, argument
//! handling and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Helper to create a test environment with a config pointing at a temp database
fn setup_test_env() -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();

    let config_dir = temp_dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let config_path = config_dir.join("config.toml");
    let db_path = data_dir.join("autopost.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[oauth]
redirect_base = "http://localhost:8080/auth/get_token"

[http]
timeout = "5s"
"#,
        escape_path_for_toml(&db_path.to_string_lossy()),
    );
    fs::write(&config_path, config_content).unwrap();

    (temp_dir, config_path.to_string_lossy().to_string())
}

fn autopost(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("autopost").unwrap();
    cmd.env("AUTOPOST_CONFIG", config_path).env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_help_flag_output() {
    let mut cmd = Command::cargo_bin("autopost").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Link social network accounts"))
        .stdout(predicate::str::contains("account"))
        .stdout(predicate::str::contains("auth-url"))
        .stdout(predicate::str::contains("callback"))
        .stdout(predicate::str::contains("pages"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_version_flag_output() {
    let mut cmd = Command::cargo_bin("autopost").unwrap();

    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("autopost"));
}

#[test]
fn test_account_add_show_list() {
    let (_temp_dir, config_path) = setup_test_env();

    let output = autopost(&config_path)
        .args(["account", "add", "VK", "--credentials", r#"{"app_id":"1","secure_key":"s3cr3t"}"#])
        .output()
        .unwrap();
    assert!(output.status.success());
    let account = stdout_json(&output);
    assert_eq!(account["socialNetwork"], "VK");
    assert_eq!(account["authorized"], false);

    // Credentials never reach stdout
    autopost(&config_path)
        .args(["account", "show", "VK"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"socialNetwork\": \"VK\""))
        .stdout(predicate::str::contains("s3cr3t").not());

    autopost(&config_path)
        .args(["account", "add", "OK"])
        .write_stdin(r#"{"app_id":"2"}"#)
        .assert()
        .success();

    let output = autopost(&config_path)
        .args(["account", "list"])
        .output()
        .unwrap();
    assert_eq!(stdout_json(&output).as_array().unwrap().len(), 2);

    let output = autopost(&config_path)
        .args(["account", "list", "--network", "OK"])
        .output()
        .unwrap();
    let accounts = stdout_json(&output);
    assert_eq!(accounts.as_array().unwrap().len(), 1);
    assert_eq!(accounts[0]["socialNetwork"], "OK");
}

#[test]
fn test_duplicate_account_exit_code() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["account", "add", "FB", "--credentials", "{}"])
        .assert()
        .success();

    autopost(&config_path)
        .args(["account", "add", "FB", "--credentials", "{}"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("social network account already exists"));
}

#[test]
fn test_invalid_network_exit_code() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["account", "add", "MySpace", "--credentials", "{}"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("socialNetworkName"));
}

#[test]
fn test_missing_account_exit_code() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["account", "show", "OK"])
        .assert()
        .failure()
        .code(5)
        .stderr(predicate::str::contains("social network OK accounts not found"));
}

#[test]
fn test_auth_url_from_stored_account() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["account", "add", "VK", "--credentials", r#"{"app_id":"51234"}"#])
        .assert()
        .success();

    autopost(&config_path)
        .args(["auth-url", "VK"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://oauth.vk.com/authorize?"))
        .stdout(predicate::str::contains("client_id=51234"));
}

#[test]
fn test_auth_url_for_reserved_network_is_internal() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["auth-url", "TWI", "--credentials", "{}"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not supported yet"));
}

#[test]
fn test_callback_requires_network() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["callback", "code=abc"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("socialNetwork"));
}

#[test]
fn test_pages_add_and_list() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["account", "add", "OK", "--credentials", "{}"])
        .assert()
        .success();

    let add = |name: &str| {
        autopost(&config_path)
            .args([
                "pages", "add", "OK", "--project", "blog", "--page-id", "555", "--name", name,
                "--token", "PAGE-SECRET",
            ])
            .output()
            .unwrap()
    };

    let first = stdout_json(&add("Blog"));
    assert_eq!(first["created"], true);

    let second = stdout_json(&add("Renamed"));
    assert_eq!(second["created"], false);
    assert_eq!(second["id"], first["id"]);

    let output = autopost(&config_path)
        .args(["pages", "list", "--network", "OK", "--project", "blog"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("PAGE-SECRET"));

    let pages = stdout_json(&output);
    assert_eq!(pages.as_array().unwrap().len(), 1);
    assert_eq!(pages[0]["pageId"], "555");
    assert_eq!(pages[0]["pageInfo"]["title"], "Renamed");
    assert_eq!(pages[0]["authorized"], true);

    let output = autopost(&config_path)
        .args(["pages", "list", "--project", "other"])
        .output()
        .unwrap();
    assert!(stdout_json(&output).as_array().unwrap().is_empty());
}

#[test]
fn test_post_dry_run_and_missing_page() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["account", "add", "VK", "--credentials", "{}"])
        .assert()
        .success();

    autopost(&config_path)
        .args(["post", "VK", "--project", "blog", "Hello", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"accepted\": true"));

    autopost(&config_path)
        .args(["post", "VK", "--project", "blog", "Hello"])
        .assert()
        .failure()
        .code(5);
}

#[test]
fn test_missing_argument_is_usage_error() {
    let (_temp_dir, config_path) = setup_test_env();

    autopost(&config_path)
        .args(["pages", "add", "OK"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_invalid_timeout_in_config() {
    let (temp_dir, _) = setup_test_env();
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[http]\ntimeout = \"soon\"\n").unwrap();

    autopost(&config_path.to_string_lossy())
        .args(["account", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("http.timeout"));
}

#[test]
fn test_missing_config_from_env_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    // Defaults put the database under $HOME
    autopost(&missing.to_string_lossy())
        .env("HOME", temp_dir.path())
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));

    assert!(temp_dir
        .path()
        .join(".local/share/autopost/autopost.db")
        .exists());
}

#[test]
fn test_missing_config_flag_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    Command::cargo_bin("autopost")
        .unwrap()
        .env_remove("AUTOPOST_CONFIG")
        .env("HOME", temp_dir.path())
        .arg("--config")
        .arg(&missing)
        .args(["account", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to read config file"));
}
