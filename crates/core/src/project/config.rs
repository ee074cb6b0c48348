use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::Chain;
use crate::project::QuorumLayout;
use crate::services::providers::ProviderKind;

/// Configuration for one customer, as found in `ground_truth.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerConfig {
    /// Trusted repositories cloned into `modules/`.
    #[serde(default)]
    pub dev_repos: Vec<String>,
    /// Optional staging repository cloned into `review_module/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_repo: Option<String>,
    /// Price-feed registries, consulted in this order.
    #[serde(default)]
    pub price_feed_providers: Vec<String>,
    /// Token registries, consulted in this order after the price-feed ones.
    #[serde(default)]
    pub token_validation_providers: Vec<String>,
}

impl CustomerConfig {
    pub fn price_feed_kinds(&self) -> Vec<ProviderKind> {
        parse_provider_names(&self.price_feed_providers, "price feed")
    }

    pub fn token_kinds(&self) -> Vec<ProviderKind> {
        parse_provider_names(&self.token_validation_providers, "token validation")
    }
}

/// Unknown names are dropped with a warning rather than failing the run.
fn parse_provider_names(names: &[String], family: &str) -> Vec<ProviderKind> {
    let mut kinds = Vec::new();
    for name in names {
        match name.parse::<ProviderKind>() {
            Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
            Ok(_) => {}
            Err(_) => warn!(provider = %name, "Unknown {family} provider; skipping"),
        }
    }
    kinds
}

/// Every customer's configuration, keyed by customer name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundTruth {
    pub customers: BTreeMap<String, CustomerConfig>,
}

impl GroundTruth {
    /// Case-insensitive customer lookup.
    pub fn customer(&self, name: &str) -> Option<(&str, &CustomerConfig)> {
        self.customers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(key, config)| (key.as_str(), config))
    }
}

/// Proposals to check for one chain in a batch file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBatch {
    #[serde(rename = "Proposals", alias = "proposals", default)]
    pub proposals: Vec<String>,
}

/// Batch execution file: `{ customer: { chain: { "Proposals": [address] } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchConfig {
    pub customers: BTreeMap<String, BTreeMap<String, ChainBatch>>,
}

/// One customer/chain slice of a batch with the chain name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub customer: String,
    pub chain: Chain,
    pub proposals: Vec<String>,
}

impl BatchConfig {
    /// Flatten into entries, rejecting unknown chain names up front so a typo
    /// is reported before any network traffic happens.
    pub fn entries(&self) -> Result<Vec<BatchEntry>> {
        let mut out = Vec::new();
        for (customer, chains) in &self.customers {
            for (chain_name, batch) in chains {
                let chain: Chain = chain_name
                    .parse()
                    .with_context(|| format!("Invalid chain in batch for customer {customer}"))?;
                out.push(BatchEntry {
                    customer: customer.clone(),
                    chain,
                    proposals: batch.proposals.clone(),
                });
            }
        }
        Ok(out)
    }
}

/// Load a YAML or JSON document, choosing the parser by file extension.
pub fn load_config_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let parsed = if matches!(ext, "yaml" | "yml") {
        serde_yaml::from_str(&body)
            .with_context(|| format!("Failed to parse YAML config {}", path.display()))?
    } else {
        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse JSON config {}", path.display()))?
    };
    Ok(parsed)
}

/// Locate the ground truth file for a layout (JSON, then YAML).
pub fn find_ground_truth(layout: &QuorumLayout) -> Option<PathBuf> {
    layout.ground_truth_candidates().into_iter().find(|p| p.is_file())
}

pub fn load_ground_truth(layout: &QuorumLayout) -> Result<GroundTruth> {
    let path = find_ground_truth(layout).ok_or_else(|| {
        anyhow!("Ground truth file not found at {}", layout.ground_truth_path.display())
    })?;
    load_config_file(&path)
}

pub fn load_batch_config(path: &Path) -> Result<BatchConfig> {
    load_config_file(path)
}
