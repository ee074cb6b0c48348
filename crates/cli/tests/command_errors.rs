use std::fs;

use predicates::prelude::*;
use tempfile::tempdir;

fn quorum() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("quorum");
    cmd.env_remove("QUORUM_PATH");
    cmd
}

const ADDRESS: &str = "0x1111111111111111111111111111111111111111";

#[test]
fn missing_quorum_path_is_reported() {
    quorum()
        .arg("cache-info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("QUORUM_PATH environment variable not set"));
}

#[test]
fn unknown_chain_lists_supported_chains() {
    let dir = tempdir().expect("tempdir");
    quorum()
        .arg("--quorum-path")
        .arg(dir.path())
        .args(["validate-address", "--customer", "Aave", "--chain", "atlantis", "--payload-address", ADDRESS])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported chain 'atlantis'"))
        .stderr(predicate::str::contains("Ethereum"));
}

#[test]
fn malformed_payload_address_is_rejected() {
    let dir = tempdir().expect("tempdir");
    quorum()
        .arg("--quorum-path")
        .arg(dir.path())
        .args(["validate-address", "--customer", "Aave", "--chain", "ETH", "--payload-address", "0x1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid address '0x1234'"));
}

#[test]
fn unknown_customer_is_rejected() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("ground_truth.json"), r#"{"Aave": {"dev_repos": []}}"#).expect("write");
    quorum()
        .arg("--quorum-path")
        .arg(dir.path())
        .args(["validate-address", "--customer", "Nobody", "--chain", "ETH", "--payload-address", ADDRESS, "--skip-sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Customer Nobody not found"));
}

#[test]
fn missing_ground_truth_is_rejected() {
    let dir = tempdir().expect("tempdir");
    quorum()
        .arg("--quorum-path")
        .arg(dir.path())
        .args(["validate-address", "--customer", "Aave", "--chain", "ETH", "--payload-address", ADDRESS, "--skip-sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Ground truth file not found"));
}

#[test]
fn batch_with_unknown_chain_fails_before_any_check() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("execution.json");
    fs::write(&config, r#"{"Aave": {"Atlantis": {"Proposals": []}}}"#).expect("write");

    quorum()
        .arg("--quorum-path")
        .arg(dir.path())
        .arg("validate-batch")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid chain in batch for customer Aave"));
}

#[test]
fn clear_cache_rejects_unknown_provider() {
    let dir = tempdir().expect("tempdir");
    quorum()
        .arg("--quorum-path")
        .arg(dir.path())
        .args(["clear-cache", "--provider", "bogus", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider 'bogus'"));
}

#[test]
fn list_runs_rejects_unknown_chain() {
    let dir = tempdir().expect("tempdir");
    quorum()
        .arg("--quorum-path")
        .arg(dir.path())
        .args(["list-runs", "--customer", "Aave", "--chain", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported chain 'nowhere'"));
}

#[test]
fn proposal_id_requires_a_governance_customer() {
    let dir = tempdir().expect("tempdir");
    quorum()
        .arg("--quorum-path")
        .arg(dir.path())
        .args(["validate-proposal-id", "--customer", "Compound", "--proposal-id", "12", "--skip-sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Customer 'Compound' has no governance source"))
        .stderr(predicate::str::contains("Supported customers: aave"));
}

#[test]
fn proposal_id_must_be_a_number() {
    quorum()
        .args(["validate-proposal-id", "--customer", "Aave", "--proposal-id", "latest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'latest'"));
}
