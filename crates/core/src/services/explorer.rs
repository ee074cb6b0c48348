//! Block explorer client (Etherscan v2 API, Routescan for Metis).
//!
//! Provides verified source code for the pipeline and the raw RPC proxies
//! the bytecode analyzer needs.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::model::{Chain, SourceUnit};
use crate::project::{HttpClient, QuorumSettings, ETHERSCAN_API_KEY_ENV};
use crate::services::bytecode::{ChainRpc, RpcError};

const ETHERSCAN_V2_URL: &str = "https://api.etherscan.io/v2/api";
const METIS_ROUTESCAN_URL: &str = "https://api.routescan.io/v2/network/mainnet/evm/1088/etherscan/api";

#[derive(Debug, Error)]
pub enum ExplorerError {
    /// The explorer has no verified source for the address.
    #[error("Contract {address} is not verified on {chain}: {message}")]
    Unverified { chain: Chain, address: String, message: String },

    #[error("{0} environment variable is not set")]
    MissingApiKey(&'static str),

    #[error("Explorer request failed: {0}")]
    Http(String),

    #[error("Explorer returned an error: {0}")]
    Api(String),

    #[error("Failed to decode explorer response: {0}")]
    Decode(String),
}

/// Verified source code for a deployed contract.
pub trait SourceProvider {
    fn source_code(&self, address: &str) -> Result<Vec<SourceUnit>, ExplorerError>;
}

pub struct EtherscanClient {
    chain: Chain,
    base_url: &'static str,
    api_key: Option<String>,
    http: HttpClient,
}

impl std::fmt::Debug for EtherscanClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtherscanClient").field("chain", &self.chain).field("base_url", &self.base_url).finish()
    }
}

impl EtherscanClient {
    /// Metis goes through Routescan without a key; every other chain needs
    /// `ETHSCAN_API_KEY`.
    pub fn new(chain: Chain, settings: &QuorumSettings, http: HttpClient) -> Result<Self, ExplorerError> {
        if chain == Chain::Metis {
            return Ok(Self { chain, base_url: METIS_ROUTESCAN_URL, api_key: None, http });
        }
        let api_key = settings
            .etherscan_api_key
            .clone()
            .ok_or(ExplorerError::MissingApiKey(ETHERSCAN_API_KEY_ENV))?;
        Ok(Self { chain, base_url: ETHERSCAN_V2_URL, api_key: Some(api_key), http })
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    fn get(&self, params: &[(&str, &str)]) -> Result<Value, ExplorerError> {
        let chain_id = self.chain.chain_id().to_string();
        let mut request = self.http.get(self.base_url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("chainid", chain_id.as_str()), ("apikey", key.as_str())]);
        }
        debug!(chain = %self.chain, action = params.iter().find(|(k, _)| *k == "action").map(|(_, v)| *v), "explorer request");
        // The API key travels in the query string; keep it out of error messages.
        let response = request
            .query(params)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExplorerError::Http(e.without_url().to_string()))?;
        response.json::<Value>().map_err(|e| ExplorerError::Decode(e.without_url().to_string()))
    }

    /// Proxy-module calls report failures as `status: "0"` or an `error` object.
    fn proxy_result(&self, params: &[(&str, &str)], what: &str) -> Result<Value, ExplorerError> {
        let data = self.get(params)?;
        if data.get("status").and_then(Value::as_str) == Some("0") || data.get("error").is_some() {
            return Err(ExplorerError::Api(format!("Error fetching {what}: {}", error_message(&data))));
        }
        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }
}

impl SourceProvider for EtherscanClient {
    fn source_code(&self, address: &str) -> Result<Vec<SourceUnit>, ExplorerError> {
        let data = self.get(&[("module", "contract"), ("action", "getsourcecode"), ("address", address)])?;
        if data.get("status").and_then(Value::as_str) != Some("1") {
            return Err(ExplorerError::Unverified {
                chain: self.chain,
                address: address.to_string(),
                message: error_message(&data),
            });
        }
        let entry = data
            .get("result")
            .and_then(|r| r.get(0))
            .ok_or_else(|| ExplorerError::Decode("getsourcecode result is empty".to_string()))?;
        let raw = entry.get("SourceCode").and_then(Value::as_str).unwrap_or_default();
        if raw.trim().is_empty() {
            return Err(ExplorerError::Unverified {
                chain: self.chain,
                address: address.to_string(),
                message: "explorer returned no source code".to_string(),
            });
        }
        let contract_name = entry.get("ContractName").and_then(Value::as_str).filter(|n| !n.is_empty());
        decode_sources(address, contract_name, raw)
    }
}

impl ChainRpc for EtherscanClient {
    fn runtime_code(&self, address: &str) -> Result<String, RpcError> {
        let result = self
            .proxy_result(
                &[("module", "proxy"), ("action", "eth_getCode"), ("address", address), ("tag", "latest")],
                "runtime bytecode",
            )
            .map_err(|e| RpcError(e.to_string()))?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    fn creation_tx_hash(&self, address: &str) -> Result<String, RpcError> {
        let result = self
            .proxy_result(
                &[("module", "contract"), ("action", "getcontractcreation"), ("contractaddresses", address)],
                "creation transaction",
            )
            .map_err(|e| RpcError(e.to_string()))?;
        result
            .get(0)
            .and_then(|entry| entry.get("txHash"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError("No creation transaction found for this contract".to_string()))
    }

    fn transaction_input(&self, tx_hash: &str) -> Result<String, RpcError> {
        let result = self
            .proxy_result(
                &[("module", "proxy"), ("action", "eth_getTransactionByHash"), ("txhash", tx_hash)],
                "creation transaction",
            )
            .map_err(|e| RpcError(e.to_string()))?;
        Ok(result.get("input").and_then(Value::as_str).unwrap_or_default().to_string())
    }
}

fn error_message(data: &Value) -> String {
    let text = |v: Option<&Value>| v.and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string);
    text(data.get("result"))
        .or_else(|| text(data.get("message")))
        .or_else(|| text(data.pointer("/error/message")))
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// Turn an explorer `SourceCode` field into source units.
///
/// Standard-JSON input (sometimes wrapped in an extra pair of braces) yields
/// one unit per entry of `sources`; a bare `{path: {content}}` map is read
/// the same way. Anything else is a single flattened file named after the
/// contract, or after the address when the name is unknown.
pub fn decode_sources(
    address: &str,
    contract_name: Option<&str>,
    raw: &str,
) -> Result<Vec<SourceUnit>, ExplorerError> {
    let trimmed = raw.trim();
    let parsed = serde_json::from_str::<Value>(trimmed).ok().or_else(|| {
        let inner = trimmed.strip_prefix('{')?.strip_suffix('}')?;
        serde_json::from_str::<Value>(inner).ok()
    });

    if let Some(Value::Object(map)) = parsed {
        let files = if let Some(Value::Object(sources)) = map.get("sources") {
            Some(sources.clone())
        } else if !map.is_empty() && map.values().all(|v| v.get("content").is_some()) {
            Some(map)
        } else {
            None
        };
        if let Some(files) = files {
            let mut units = Vec::with_capacity(files.len());
            for (path, entry) in files {
                let content = entry
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ExplorerError::Decode(format!("source {path} has no content")))?;
                units.push(SourceUnit::from_text(path, content));
            }
            return Ok(units);
        }
    }

    let name = match contract_name {
        Some(name) => format!("{name}.sol"),
        None => address.to_string(),
    };
    Ok(vec![SourceUnit::from_text(name, raw)])
}
