use serde_json::Value;

use super::{decode_json, lower, send, AddressRegistry, ProviderError};
use crate::model::{AddressRecord, Chain};
use crate::project::HttpClient;

const NAME: &str = "CoinMarketCap";
const BASE_URL: &str = "https://pro-api.coinmarketcap.com";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// CoinMarketCap token metadata. Requires an API key, which is checked once
/// when the provider is built.
pub struct CoinMarketCapRegistry {
    http: HttpClient,
    api_key: String,
}

impl CoinMarketCapRegistry {
    pub fn new(http: HttpClient, api_key: String) -> Self {
        Self { http, api_key }
    }

    /// Probe the key-info endpoint; 401/403 surface as `Unauthorized`.
    pub fn verify_key(&self) -> Result<(), ProviderError> {
        let url = format!("{BASE_URL}/v1/key/info");
        let response = send(NAME, self.http.get(&url).header(API_KEY_HEADER, &self.api_key))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Http {
                provider: NAME,
                message: format!("key check returned HTTP {}", response.status()),
            })
        }
    }
}

impl AddressRegistry for CoinMarketCapRegistry {
    fn name(&self) -> &'static str {
        NAME
    }

    fn lookup(&self, chain: Chain, address: &str) -> Result<Option<AddressRecord>, ProviderError> {
        let url = format!("{BASE_URL}/v2/cryptocurrency/info");
        let request = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("address", address)]);
        let response = send(NAME, request)?;
        // Unknown addresses come back as 400 with an error body.
        if !response.status().is_success() {
            return Ok(None);
        }
        let body: Value = decode_json(NAME, response)?;
        Ok(record_from_info(&body, chain, address))
    }
}

/// Pick the first asset under `data` and accept it only when its platform
/// matches the chain being checked.
fn record_from_info(body: &Value, chain: Chain, address: &str) -> Option<AddressRecord> {
    let first = body.get("data")?.as_object()?.values().next()?;
    let asset = match first {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let platform = asset.get("platform")?;
    let platform_name = platform.get("name")?.as_str()?;
    if !platform_name.eq_ignore_ascii_case(chain.name()) {
        return None;
    }
    let token_address = lower(platform.get("token_address").and_then(Value::as_str));
    Some(AddressRecord {
        primary_address: address.to_string(),
        alternate_address: token_address.filter(|t| t != address),
        display_name: asset.get("name").and_then(Value::as_str).map(str::to_string),
        symbol_or_pair: asset.get("symbol").and_then(Value::as_str).map(str::to_string),
        decimals: None,
    })
}
