use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::{info, warn};

use super::{decode_json, lower, require_success, send, AddressRegistry, ProviderError};
use crate::model::{AddressRecord, Chain};
use crate::project::HttpClient;

const NAME: &str = "Chronicle";
const BASE_URL: &str = "https://chroniclelabs.org/api";

#[derive(Debug, Deserialize)]
struct ChroniclePair {
    blockchain: String,
    pair: String,
}

#[derive(Debug, Deserialize)]
struct ChronicleOracle {
    address: Option<String>,
    pair: Option<String>,
    decimals: Option<u32>,
}

/// Chronicle oracles. The pair list is fetched once; oracle details are
/// fetched per chain on first use.
pub struct ChronicleRegistry {
    http: HttpClient,
    pairs: Mutex<Option<Arc<HashMap<String, Vec<String>>>>>,
    oracles: Mutex<HashMap<Chain, Arc<HashMap<String, AddressRecord>>>>,
}

impl ChronicleRegistry {
    pub fn new(http: HttpClient) -> Self {
        Self { http, pairs: Mutex::new(None), oracles: Mutex::new(HashMap::new()) }
    }

    /// Identifier Chronicle uses for a network.
    fn blockchain_id(chain: Chain) -> Option<&'static str> {
        Some(match chain {
            Chain::Ethereum => "ETH",
            Chain::Arbitrum => "ARB",
            Chain::Avalanche => "AVAX",
            Chain::Base => "BASE",
            Chain::Bnb => "BSC",
            Chain::Gnosis => "GNO",
            Chain::Metis => "MET",
            Chain::Optimism => "OPT",
            Chain::Polygon => "POLY",
            Chain::Scroll => "SCROLL",
            Chain::Zksync => "ZKSYNC",
            Chain::Linea | Chain::Celo | Chain::Sonic => return None,
        })
    }

    fn pairs(&self) -> Result<Arc<HashMap<String, Vec<String>>>, ProviderError> {
        let mut memo = self.pairs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pairs) = memo.as_ref() {
            return Ok(Arc::clone(pairs));
        }
        let url = format!("{BASE_URL}/pairs?testnet=false");
        let response = require_success(NAME, send(NAME, self.http.get(&url))?)?;
        let listed: Vec<ChroniclePair> = decode_json(NAME, response)?;
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for entry in listed {
            grouped.entry(entry.blockchain.to_ascii_uppercase()).or_default().push(entry.pair);
        }
        let grouped = Arc::new(grouped);
        *memo = Some(Arc::clone(&grouped));
        Ok(grouped)
    }

    fn oracles_for(
        &self,
        chain: Chain,
    ) -> Result<Arc<HashMap<String, AddressRecord>>, ProviderError> {
        let mut memo = self.oracles.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = memo.get(&chain) {
            return Ok(Arc::clone(index));
        }
        let mut index = HashMap::new();
        if let Some(blockchain) = Self::blockchain_id(chain) {
            let pairs = self.pairs()?;
            let names = pairs.get(blockchain).cloned().unwrap_or_default();
            info!(%chain, pairs = names.len(), "downloading Chronicle oracle info");
            index = Self::index_oracles(&names, |pair| {
                let url = format!("{BASE_URL}/median/info/{pair}/{blockchain}/?testnet=false");
                let response = send(NAME, self.http.get(&url))?;
                if !response.status().is_success() {
                    return Err(ProviderError::Http { provider: NAME, message: format!("HTTP {}", response.status()) });
                }
                response.text().map_err(|e| ProviderError::Http { provider: NAME, message: e.to_string() })
            })?;
        }
        let index = Arc::new(index);
        memo.insert(chain, Arc::clone(&index));
        Ok(index)
    }
}

impl ChronicleRegistry {
    /// Build a chain's oracle index from each pair's median info.
    ///
    /// A pair that cannot be fetched or decoded is skipped so the rest of the
    /// index is still usable. Credential errors stop the whole build.
    pub fn index_oracles<F>(pairs: &[String], mut fetch: F) -> Result<HashMap<String, AddressRecord>, ProviderError>
    where
        F: FnMut(&str) -> Result<String, ProviderError>,
    {
        let mut index = HashMap::new();
        for pair in pairs {
            let oracles = fetch(pair).and_then(|body| {
                serde_json::from_str::<Vec<ChronicleOracle>>(&body)
                    .map_err(|e| ProviderError::Decode { provider: NAME, message: e.to_string() })
            });
            let oracles = match oracles {
                Ok(oracles) => oracles,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(%pair, error = %err, "skipping Chronicle pair");
                    continue;
                }
            };
            for oracle in oracles {
                let Some(address) = lower(oracle.address.as_deref()) else {
                    continue;
                };
                let label = oracle.pair.unwrap_or_else(|| pair.clone());
                index.insert(
                    address.clone(),
                    AddressRecord {
                        primary_address: address,
                        alternate_address: None,
                        display_name: Some(label.clone()),
                        symbol_or_pair: Some(label),
                        decimals: oracle.decimals,
                    },
                );
            }
        }
        Ok(index)
    }
}

impl AddressRegistry for ChronicleRegistry {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, chain: Chain) -> bool {
        Self::blockchain_id(chain).is_some()
    }

    fn lookup(&self, chain: Chain, address: &str) -> Result<Option<AddressRecord>, ProviderError> {
        Ok(self.oracles_for(chain)?.get(address).cloned())
    }
}
