use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::info;

use super::{decode_json, lower, require_success, send, AddressRegistry, ProviderError};
use crate::model::{AddressRecord, Chain};
use crate::project::HttpClient;

const NAME: &str = "Chainlink";
const BASE_URL: &str = "https://reference-data-directory.vercel.app";

type FeedIndex = HashMap<String, AddressRecord>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainlinkFeed {
    name: Option<String>,
    #[serde(default)]
    pair: Option<serde_json::Value>,
    contract_address: Option<String>,
    proxy_address: Option<String>,
    decimals: Option<u32>,
}

/// Chainlink reference data directory. The directory is published as one
/// JSON document per network, so each chain is downloaded once and indexed
/// by both aggregator and proxy address.
pub struct ChainlinkRegistry {
    http: HttpClient,
    feeds: Mutex<HashMap<Chain, Arc<FeedIndex>>>,
}

impl ChainlinkRegistry {
    pub fn new(http: HttpClient) -> Self {
        Self { http, feeds: Mutex::new(HashMap::new()) }
    }

    fn feeds_file(chain: Chain) -> Option<&'static str> {
        Some(match chain {
            Chain::Ethereum => "feeds-mainnet.json",
            Chain::Arbitrum => "feeds-ethereum-mainnet-arbitrum-1.json",
            Chain::Avalanche => "feeds-avalanche-mainnet.json",
            Chain::Base => "feeds-ethereum-mainnet-base-1.json",
            Chain::Bnb => "feeds-bsc-mainnet.json",
            Chain::Gnosis => "feeds-xdai-mainnet.json",
            Chain::Metis => "feeds-ethereum-mainnet-andromeda-1.json",
            Chain::Optimism => "feeds-ethereum-mainnet-optimism-1.json",
            Chain::Polygon => "feeds-matic-mainnet.json",
            Chain::Scroll => "feeds-ethereum-mainnet-scroll-1.json",
            Chain::Zksync => "feeds-ethereum-mainnet-zksync-1.json",
            Chain::Linea | Chain::Celo | Chain::Sonic => return None,
        })
    }

    /// Index a directory document by aggregator address and by proxy address.
    /// The aggregator is the primary address of every record.
    pub fn index_feeds(body: &str) -> Result<HashMap<String, AddressRecord>, ProviderError> {
        let feeds: Vec<ChainlinkFeed> = serde_json::from_str(body)
            .map_err(|e| ProviderError::Decode { provider: NAME, message: e.to_string() })?;
        Ok(index(feeds))
    }

    fn feeds_for(&self, chain: Chain) -> Result<Arc<FeedIndex>, ProviderError> {
        let mut memo = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = memo.get(&chain) {
            return Ok(Arc::clone(index));
        }
        let Some(file) = Self::feeds_file(chain) else {
            return Ok(Arc::new(FeedIndex::new()));
        };
        let url = format!("{BASE_URL}/{file}");
        info!(%chain, %url, "downloading Chainlink feed directory");
        let response = require_success(NAME, send(NAME, self.http.get(&url))?)?;
        let feeds: Vec<ChainlinkFeed> = decode_json(NAME, response)?;
        let index = Arc::new(index(feeds));
        memo.insert(chain, Arc::clone(&index));
        Ok(index)
    }
}

fn index(feeds: Vec<ChainlinkFeed>) -> FeedIndex {
    let mut out = FeedIndex::new();
    for feed in feeds {
        let Some(primary) = lower(feed.contract_address.as_deref()) else {
            continue;
        };
        let record = AddressRecord {
            primary_address: primary.clone(),
            alternate_address: lower(feed.proxy_address.as_deref()),
            display_name: feed.name,
            symbol_or_pair: feed.pair.as_ref().and_then(pair_label),
            decimals: feed.decimals,
        };
        if let Some(proxy) = &record.alternate_address {
            out.insert(proxy.clone(), record.clone());
        }
        out.insert(primary, record);
    }
    out
}

/// `["ETH", "USD"]` -> `ETH / USD`; plain strings pass through.
fn pair_label(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(parts) => {
            let parts: Vec<&str> =
                parts.iter().filter_map(|p| p.as_str()).filter(|p| !p.is_empty()).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" / "))
            }
        }
        _ => None,
    }
}

impl AddressRegistry for ChainlinkRegistry {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, chain: Chain) -> bool {
        Self::feeds_file(chain).is_some()
    }

    fn lookup(&self, chain: Chain, address: &str) -> Result<Option<AddressRecord>, ProviderError> {
        Ok(self.feeds_for(chain)?.get(address).cloned())
    }
}
