//! Governance proposal lookups.
//!
//! A governance proposal bundles one payload per target chain. The payload
//! actions' targets are the addresses the pipeline checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::Chain;
use crate::project::HttpClient;

const BGD_CACHE_URL: &str = "https://raw.githubusercontent.com/bgd-labs/v3-governance-cache/refs/heads/main/cache";
const AAVE_GOVERNANCE: &str = "1/0x9AEE0B04504CeF83A65AC3f0e838D0593BCb2BC7";

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("Customer '{customer}' has no governance source. Supported customers: {supported}")]
    UnsupportedCustomer { customer: String, supported: String },

    #[error("Proposal id {proposal_id} could not be found at {url}. The governance cache is most likely not updated yet")]
    ProposalNotFound { proposal_id: u64, url: String },

    #[error("Payload {payload_id} on chain id {chain_id} could not be found at {url}. The governance cache is most likely not updated yet")]
    PayloadNotFound { chain_id: String, payload_id: u64, url: String },

    #[error("Proposal references unsupported chain id {0}")]
    UnsupportedChainId(String),

    #[error("Governance request failed: {0}")]
    Http(String),

    #[error("Failed to decode governance data: {0}")]
    Decode(String),
}

/// Addresses a proposal executes on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadAddresses {
    pub chain: Chain,
    pub addresses: Vec<String>,
}

/// Reference to one payload inside a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadRef {
    pub chain: String,
    pub payloads_controller: String,
    pub payload_id: u64,
}

#[derive(Debug, Deserialize)]
struct ProposalDocument {
    proposal: Option<ProposalBody>,
}

#[derive(Debug, Deserialize)]
struct ProposalBody {
    #[serde(default)]
    payloads: Vec<PayloadRef>,
}

#[derive(Debug, Deserialize)]
struct PayloadDocument {
    payload: PayloadBody,
}

#[derive(Debug, Deserialize)]
struct PayloadBody {
    #[serde(default)]
    actions: Vec<PayloadAction>,
}

#[derive(Debug, Deserialize)]
struct PayloadAction {
    target: String,
}

/// Source of proposal payloads for a governance system.
pub trait GovernanceProvider {
    fn name(&self) -> &'static str;

    /// Every payload of `proposal_id`, grouped by chain, in proposal order.
    fn proposal_payloads(&self, proposal_id: u64) -> Result<Vec<PayloadAddresses>, GovernanceError>;
}

/// Customers with a governance source, lowercased.
pub const GOVERNANCE_CUSTOMERS: [&str; 1] = ["aave"];

/// Governance source for `customer`, matched case-insensitively.
pub fn governance_for(customer: &str, http: HttpClient) -> Result<Box<dyn GovernanceProvider>, GovernanceError> {
    match customer.trim().to_ascii_lowercase().as_str() {
        "aave" => Ok(Box::new(AaveGovernanceCache::new(http))),
        _ => Err(GovernanceError::UnsupportedCustomer {
            customer: customer.to_string(),
            supported: GOVERNANCE_CUSTOMERS.join(", "),
        }),
    }
}

/// Aave governance v3 through the BGD governance cache repository.
pub struct AaveGovernanceCache {
    http: HttpClient,
}

impl AaveGovernanceCache {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// `Ok(None)` on 404 so callers can report what was missing.
    fn fetch(&self, url: &str) -> Result<Option<String>, GovernanceError> {
        debug!(%url, "governance cache request");
        let response = self.http.get(url).send().map_err(|e| GovernanceError::Http(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(|e| GovernanceError::Http(e.to_string()))?;
        response.text().map(Some).map_err(|e| GovernanceError::Http(e.to_string()))
    }
}

impl GovernanceProvider for AaveGovernanceCache {
    fn name(&self) -> &'static str {
        "Aave governance cache"
    }

    fn proposal_payloads(&self, proposal_id: u64) -> Result<Vec<PayloadAddresses>, GovernanceError> {
        let url = format!("{BGD_CACHE_URL}/{AAVE_GOVERNANCE}/proposals/{proposal_id}.json");
        let body = self.fetch(&url)?.ok_or(GovernanceError::ProposalNotFound { proposal_id, url })?;
        let payloads = parse_proposal_payloads(&body)?;
        info!(proposal_id, payloads = payloads.len(), "fetched governance proposal");

        let mut out = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let chain = chain_for_id(&payload.chain)?;
            let url = format!(
                "{BGD_CACHE_URL}/{}/{}/payloads/{}.json",
                payload.chain, payload.payloads_controller, payload.payload_id
            );
            let body = self.fetch(&url)?.ok_or_else(|| GovernanceError::PayloadNotFound {
                chain_id: payload.chain.clone(),
                payload_id: payload.payload_id,
                url,
            })?;
            out.push(PayloadAddresses { chain, addresses: parse_payload_targets(&body)? });
        }
        Ok(out)
    }
}

/// Payload references listed in a cached proposal document.
pub fn parse_proposal_payloads(body: &str) -> Result<Vec<PayloadRef>, GovernanceError> {
    let document: ProposalDocument =
        serde_json::from_str(body).map_err(|e| GovernanceError::Decode(e.to_string()))?;
    Ok(document.proposal.map(|p| p.payloads).unwrap_or_default())
}

/// Action targets of a cached payload document, in execution order.
pub fn parse_payload_targets(body: &str) -> Result<Vec<String>, GovernanceError> {
    let document: PayloadDocument =
        serde_json::from_str(body).map_err(|e| GovernanceError::Decode(e.to_string()))?;
    Ok(document.payload.actions.into_iter().map(|a| a.target).collect())
}

/// Map a decimal chain id as written in the cache to a supported chain.
pub fn chain_for_id(chain_id: &str) -> Result<Chain, GovernanceError> {
    chain_id
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(Chain::from_chain_id)
        .ok_or_else(|| GovernanceError::UnsupportedChainId(chain_id.to_string()))
}
