use std::collections::HashMap;

use reqwest::StatusCode;
use serde::Deserialize;

use super::{decode_json, lower, send, AddressRegistry, ProviderError};
use crate::model::{AddressRecord, Chain};
use crate::project::HttpClient;

const NAME: &str = "Coingecko";
const BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct CoinInfo {
    name: Option<String>,
    symbol: Option<String>,
    #[serde(default)]
    detail_platforms: HashMap<String, Option<PlatformDetail>>,
}

#[derive(Debug, Deserialize)]
struct PlatformDetail {
    contract_address: Option<String>,
    decimal_place: Option<u32>,
}

/// CoinGecko token contracts, looked up one address at a time.
pub struct CoinGeckoRegistry {
    http: HttpClient,
}

impl CoinGeckoRegistry {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn platform(chain: Chain) -> Option<&'static str> {
        Some(match chain {
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum-one",
            Chain::Avalanche => "avalanche",
            Chain::Base => "base",
            Chain::Bnb => "binance-smart-chain",
            Chain::Gnosis => "gnosis",
            Chain::Metis => "metis-andromeda",
            Chain::Optimism => "optimistic-ethereum",
            Chain::Polygon => "polygon-pos",
            Chain::Scroll => "scroll",
            Chain::Zksync => "zksync",
            Chain::Linea | Chain::Celo | Chain::Sonic => return None,
        })
    }
}

impl AddressRegistry for CoinGeckoRegistry {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, chain: Chain) -> bool {
        Self::platform(chain).is_some()
    }

    fn lookup(&self, chain: Chain, address: &str) -> Result<Option<AddressRecord>, ProviderError> {
        let Some(platform) = Self::platform(chain) else {
            return Ok(None);
        };
        let url = format!("{BASE_URL}/coins/{platform}/contract/{address}");
        let response = send(NAME, self.http.get(&url))?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            status => {
                return Err(ProviderError::Http { provider: NAME, message: format!("HTTP {status}") })
            }
        }
        let info: CoinInfo = decode_json(NAME, response)?;
        let Some(Some(detail)) = info.detail_platforms.get(platform) else {
            return Ok(None);
        };
        let Some(primary) = lower(detail.contract_address.as_deref()) else {
            return Ok(None);
        };
        Ok(Some(AddressRecord {
            primary_address: primary,
            alternate_address: None,
            display_name: info.name,
            symbol_or_pair: info.symbol,
            decimals: detail.decimal_place,
        }))
    }
}
