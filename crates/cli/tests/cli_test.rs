//! Basic CLI integration tests. None of these touch the network.

#![allow(deprecated)] // Command::cargo_bin deprecated for custom build-dir; still works for default

use assert_cmd::Command;
use pretty_assertions::assert_eq;

/// Run the binary with config and cache directories pointed at a scratch dir.
fn bokelai(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bokelai").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_CACHE_HOME", home.path().join("cache"))
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

#[test]
fn help_prints_and_exits_success() {
    let home = tempfile::tempdir().unwrap();
    bokelai(&home).arg("--help").assert().success();
}

#[test]
fn config_show_json_valid() {
    let home = tempfile::tempdir().unwrap();
    let out = bokelai(&home).args(["config", "show", "--json"]).assert().success();
    let json: serde_json::Value =
        serde_json::from_str(&stdout_of(&out)).expect("config show --json should output valid JSON");
    assert_eq!(json["source"]["timeout_secs"], 30);
    assert_eq!(json["source"]["query_separator"], "");
}

#[test]
fn config_set_then_show() {
    let home = tempfile::tempdir().unwrap();
    bokelai(&home)
        .args(["config", "set", "source.query_separator", "+"])
        .assert()
        .success();
    let out = bokelai(&home).args(["config", "show", "--json"]).assert().success();
    let json: serde_json::Value = serde_json::from_str(&stdout_of(&out)).unwrap();
    assert_eq!(json["source"]["query_separator"], "+");
}

#[test]
fn config_set_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    bokelai(&home)
        .args(["config", "set", "source.colour", "blue"])
        .assert()
        .failure();
}

#[test]
fn url_prints_detail_page() {
    let home = tempfile::tempdir().unwrap();
    let out = bokelai(&home).args(["url", "0010878888"]).assert().success();
    assert_eq!(stdout_of(&out).trim(), "https://www.books.com.tw/products/0010878888");
}

#[test]
fn parse_url_extracts_id() {
    let home = tempfile::tempdir().unwrap();
    let out = bokelai(&home)
        .args(["parse-url", "https://www.books.com.tw/products/0010878888?sloc=main"])
        .assert()
        .success();
    assert_eq!(stdout_of(&out).trim(), "bokelai:0010878888");
}

#[test]
fn parse_url_rejects_other_sites() {
    let home = tempfile::tempdir().unwrap();
    bokelai(&home)
        .args(["parse-url", "https://example.com/products/1"])
        .assert()
        .failure();
}

#[test]
fn info_json_lists_capabilities() {
    let home = tempfile::tempdir().unwrap();
    let out = bokelai(&home).args(["info", "--json"]).assert().success();
    let json: serde_json::Value = serde_json::from_str(&stdout_of(&out)).unwrap();
    assert_eq!(json["name"], "Bokelai Books.com.tw");
    assert_eq!(json["capabilities"], serde_json::json!(["identify", "cover"]));
}

#[test]
fn zero_timeout_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    bokelai(&home)
        .args(["identify", "--isbn", "9789862624654", "--timeout", "0"])
        .assert()
        .failure();
}

#[test]
fn config_set_zero_timeout_fails() {
    let home = tempfile::tempdir().unwrap();
    bokelai(&home)
        .args(["config", "set", "source.timeout_secs", "0"])
        .assert()
        .failure();
}

#[test]
fn url_ignores_corrupt_cover_cache() {
    let home = tempfile::tempdir().unwrap();
    let cache_dir = home.path().join("cache").join("bokelai");
    std::fs::create_dir_all(&cache_dir).unwrap();
    std::fs::write(cache_dir.join("cover_urls.json"), "{ not json").unwrap();

    let out = bokelai(&home).args(["url", "0010878888"]).assert().success();
    assert_eq!(stdout_of(&out).trim(), "https://www.books.com.tw/products/0010878888");
    bokelai(&home)
        .args(["parse-url", "https://www.books.com.tw/products/0010878888"])
        .assert()
        .success();
}
