use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub const QUORUM_PATH_ENV: &str = "QUORUM_PATH";
pub const ETHERSCAN_API_KEY_ENV: &str = "ETHSCAN_API_KEY";
pub const COINMARKETCAP_API_KEY_ENV: &str = "COINMARKETCAP_API_KEY";
pub const HTTP_TIMEOUT_ENV: &str = "QUORUM_HTTP_TIMEOUT_SECS";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub type HttpClient = reqwest::blocking::Client;

/// Process-level settings, read from the environment once and passed down
/// explicitly.
#[derive(Debug, Clone)]
pub struct QuorumSettings {
    pub main_path: PathBuf,
    pub etherscan_api_key: Option<String>,
    pub coinmarketcap_api_key: Option<String>,
    pub http_timeout: Duration,
}

impl QuorumSettings {
    /// Read settings from the environment. `QUORUM_PATH` is required.
    pub fn from_env() -> Result<Self> {
        let main_path = non_empty_env(QUORUM_PATH_ENV)
            .ok_or_else(|| anyhow!("{QUORUM_PATH_ENV} environment variable not set"))?;
        Ok(Self::with_main_path(main_path))
    }

    /// Use an explicit main path; API keys and timeout still come from the environment.
    pub fn with_main_path(main_path: impl AsRef<Path>) -> Self {
        let http_timeout = non_empty_env(HTTP_TIMEOUT_ENV)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);
        Self {
            main_path: main_path.as_ref().to_path_buf(),
            etherscan_api_key: non_empty_env(ETHERSCAN_API_KEY_ENV),
            coinmarketcap_api_key: non_empty_env(COINMARKETCAP_API_KEY_ENV),
            http_timeout,
        }
    }

    /// Blocking HTTP client shared by the explorer and all registries.
    pub fn http_client(&self) -> Result<HttpClient> {
        HttpClient::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("quorum/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
