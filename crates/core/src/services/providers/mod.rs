//! Address registries and the caching provider wrapper.
//!
//! A registry answers "what is this address on this chain?" from a remote
//! source. `AddressProvider` wraps one registry with the shared on-disk cache
//! so every lookup is read-through. Which registries a customer uses, and in
//! which order, comes from configuration via the closed `ProviderKind` set.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::blocking::{RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::cache::{AddressCache, CacheError};
use crate::model::{AddressRecord, Chain};
use crate::project::{HttpClient, QuorumSettings, COINMARKETCAP_API_KEY_ENV};

mod chainlink;
mod chronicle;
mod coingecko;
mod coinmarketcap;

pub use chainlink::ChainlinkRegistry;
pub use chronicle::ChronicleRegistry;
pub use coingecko::CoinGeckoRegistry;
pub use coinmarketcap::CoinMarketCapRegistry;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} requires {variable} to be set")]
    MissingCredential { provider: &'static str, variable: &'static str },

    #[error("{provider} rejected the configured API key (invalid or expired)")]
    Unauthorized { provider: &'static str },

    #[error("{provider} request failed: {message}")]
    Http { provider: &'static str, message: String },

    #[error("{provider} returned an unexpected payload: {message}")]
    Decode { provider: &'static str, message: String },

    #[error("Address cache error: {0}")]
    Cache(#[from] CacheError),
}

impl ProviderError {
    /// Credential problems abort the proposal; anything else only loses one lookup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProviderError::MissingCredential { .. } | ProviderError::Unauthorized { .. })
    }
}

/// Remote source of address metadata.
pub trait AddressRegistry: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the registry has any data for `chain`. Unsupported chains are
    /// answered with "absent" without touching the network.
    fn supports(&self, _chain: Chain) -> bool {
        true
    }

    /// Look up a lower-cased address. `Ok(None)` means the registry does not know it.
    fn lookup(&self, chain: Chain, address: &str) -> Result<Option<AddressRecord>, ProviderError>;
}

/// A registry plus the shared cache: the unit the checks consult.
pub struct AddressProvider {
    registry: Box<dyn AddressRegistry>,
    cache: Arc<AddressCache>,
}

impl fmt::Debug for AddressProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressProvider").field("registry", &self.registry.name()).finish()
    }
}

impl AddressProvider {
    pub fn new(registry: Box<dyn AddressRegistry>, cache: Arc<AddressCache>) -> Self {
        Self { registry, cache }
    }

    pub fn name(&self) -> &'static str {
        self.registry.name()
    }

    /// Cache first; on a miss ask the registry and persist a successful answer
    /// before returning it. Misses are not cached.
    pub fn resolve(
        &self,
        chain: Chain,
        address: &str,
    ) -> Result<Option<AddressRecord>, ProviderError> {
        let key = address.to_ascii_lowercase();
        let provider = self.registry.name();
        if let Some(hit) = self.cache.get(provider, chain.name(), &key)? {
            debug!(provider, %chain, address = %key, "address cache hit");
            return Ok(Some(hit));
        }
        if !self.registry.supports(chain) {
            debug!(provider, %chain, "chain not supported by registry");
            return Ok(None);
        }
        let found = self.registry.lookup(chain, &key)?;
        if let Some(record) = &found {
            self.cache.put(provider, chain.name(), &key, record)?;
        }
        Ok(found)
    }
}

/// The registries this build knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProviderKind {
    Chainlink,
    Chronicle,
    CoinGecko,
    CoinMarketCap,
}

#[derive(Debug, Error)]
#[error("Unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Chainlink,
        ProviderKind::Chronicle,
        ProviderKind::CoinGecko,
        ProviderKind::CoinMarketCap,
    ];

    /// Name used in configuration, cache keys and output.
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Chainlink => "Chainlink",
            ProviderKind::Chronicle => "Chronicle",
            ProviderKind::CoinGecko => "Coingecko",
            ProviderKind::CoinMarketCap => "CoinMarketCap",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ProviderKind::Chainlink => "Chainlink data feeds (reference data directory)",
            ProviderKind::Chronicle => "Chronicle oracle medians",
            ProviderKind::CoinGecko => "CoinGecko token contracts (public API)",
            ProviderKind::CoinMarketCap => {
                "CoinMarketCap token metadata (requires COINMARKETCAP_API_KEY)"
            }
        }
    }

    /// Price-feed registries by default; the rest are token registries.
    pub fn is_price_feed(self) -> bool {
        matches!(self, ProviderKind::Chainlink | ProviderKind::Chronicle)
    }

    /// Construct the registry and wrap it with the cache.
    ///
    /// Credentialed registries validate their key here so that a bad key
    /// aborts before any address is looked up.
    pub fn build(
        self,
        settings: &QuorumSettings,
        http: &HttpClient,
        cache: Arc<AddressCache>,
    ) -> Result<AddressProvider, ProviderError> {
        let registry: Box<dyn AddressRegistry> = match self {
            ProviderKind::Chainlink => Box::new(ChainlinkRegistry::new(http.clone())),
            ProviderKind::Chronicle => Box::new(ChronicleRegistry::new(http.clone())),
            ProviderKind::CoinGecko => Box::new(CoinGeckoRegistry::new(http.clone())),
            ProviderKind::CoinMarketCap => {
                let key = settings.coinmarketcap_api_key.clone().ok_or(
                    ProviderError::MissingCredential {
                        provider: self.name(),
                        variable: COINMARKETCAP_API_KEY_ENV,
                    },
                )?;
                let registry = CoinMarketCapRegistry::new(http.clone(), key);
                registry.verify_key()?;
                Box::new(registry)
            }
        };
        Ok(AddressProvider::new(registry, cache))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chainlink" => Ok(ProviderKind::Chainlink),
            "chronicle" => Ok(ProviderKind::Chronicle),
            "coingecko" => Ok(ProviderKind::CoinGecko),
            "coinmarketcap" | "cmc" => Ok(ProviderKind::CoinMarketCap),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// Build providers for `kinds` in order, stopping at the first failure.
pub fn build_providers(
    kinds: &[ProviderKind],
    settings: &QuorumSettings,
    http: &HttpClient,
    cache: &Arc<AddressCache>,
) -> Result<Vec<AddressProvider>, ProviderError> {
    kinds.iter().map(|kind| kind.build(settings, http, Arc::clone(cache))).collect()
}

/// Send a request; map transport failures and credential rejections.
/// Other statuses are left to the caller.
pub(crate) fn send(provider: &'static str, request: RequestBuilder) -> Result<Response, ProviderError> {
    let response =
        request.send().map_err(|e| ProviderError::Http { provider, message: e.to_string() })?;
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ProviderError::Unauthorized { provider })
        }
        _ => Ok(response),
    }
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    response: Response,
) -> Result<T, ProviderError> {
    response.json::<T>().map_err(|e| ProviderError::Decode { provider, message: e.to_string() })
}

/// Fail on any non-success status.
pub(crate) fn require_success(
    provider: &'static str,
    response: Response,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ProviderError::Http { provider, message: format!("HTTP {status}") })
    }
}

pub(crate) fn lower(address: Option<&str>) -> Option<String> {
    address.map(str::trim).filter(|a| !a.is_empty()).map(str::to_ascii_lowercase)
}
