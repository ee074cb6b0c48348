use std::fs;

use quorum::canonicalize_or_current;
use quorum::commands::{list_providers_command, print_dir_status, setup_command, SETUP_TEMPLATES};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let cwd = std::env::current_dir().expect("cwd");
    assert_eq!(canonicalize_or_current(".").expect("canonicalize"), cwd);
}

#[test]
fn canonicalize_or_current_resolves_existing_path() {
    let tmp = tempdir().expect("tempdir");
    let nested = tmp.path().join("nested");
    fs::create_dir_all(&nested).expect("create nested");

    let result = canonicalize_or_current(nested.to_str().expect("utf8")).expect("canonicalize");
    assert_eq!(result, nested.canonicalize().expect("canonicalize nested"));
}

#[test]
fn canonicalize_or_current_joins_missing_relative_path() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current("does-not-exist-yet/work").expect("canonicalize");
    assert_eq!(result, cwd.join("does-not-exist-yet/work"));
}

#[test]
fn setup_command_creates_missing_directory() {
    let tmp = tempdir().expect("tempdir");
    let target = tmp.path().join("a").join("b");

    setup_command(target.to_str().expect("utf8")).expect("setup");

    for (name, contents) in SETUP_TEMPLATES {
        let written = fs::read_to_string(target.join(name)).expect("template");
        assert!(written.starts_with(contents.lines().next().unwrap_or_default()));
    }
    let ground_truth: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(target.join("ground_truth.json")).expect("read")).expect("json");
    assert!(ground_truth["Aave"]["dev_repos"].is_array());
}

#[test]
fn print_dir_status_handles_missing_and_existing_dirs() {
    let tmp = tempdir().expect("tempdir");
    print_dir_status("Missing", &tmp.path().join("missing"));
    print_dir_status("Existing", tmp.path());
}

#[test]
fn list_providers_command_succeeds() {
    list_providers_command(false).expect("text");
    list_providers_command(true).expect("json");
}
