use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EVM networks a proposal can be deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Chain {
    Ethereum,
    Arbitrum,
    Avalanche,
    Base,
    Bnb,
    Gnosis,
    Metis,
    Optimism,
    Polygon,
    Scroll,
    Zksync,
    Linea,
    Celo,
    Sonic,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported chain '{input}'. Supported chains: {supported}")]
pub struct ChainParseError {
    pub input: String,
    pub supported: String,
}

impl Chain {
    pub const ALL: [Chain; 14] = [
        Chain::Ethereum,
        Chain::Arbitrum,
        Chain::Avalanche,
        Chain::Base,
        Chain::Bnb,
        Chain::Gnosis,
        Chain::Metis,
        Chain::Optimism,
        Chain::Polygon,
        Chain::Scroll,
        Chain::Zksync,
        Chain::Linea,
        Chain::Celo,
        Chain::Sonic,
    ];

    /// Display name, also used as the chain segment of check directories.
    pub fn name(self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Arbitrum => "Arbitrum",
            Chain::Avalanche => "Avalanche",
            Chain::Base => "Base",
            Chain::Bnb => "BNB",
            Chain::Gnosis => "Gnosis",
            Chain::Metis => "Metis",
            Chain::Optimism => "Optimism",
            Chain::Polygon => "Polygon",
            Chain::Scroll => "Scroll",
            Chain::Zksync => "ZKsync",
            Chain::Linea => "Linea",
            Chain::Celo => "Celo",
            Chain::Sonic => "Sonic",
        }
    }

    /// Short ticker-style code accepted on the command line.
    pub fn code(self) -> &'static str {
        match self {
            Chain::Ethereum => "ETH",
            Chain::Arbitrum => "ARB",
            Chain::Avalanche => "AVAX",
            Chain::Base => "BASE",
            Chain::Bnb => "BSC",
            Chain::Gnosis => "GNO",
            Chain::Metis => "METIS",
            Chain::Optimism => "OPT",
            Chain::Polygon => "POLY",
            Chain::Scroll => "SCROLL",
            Chain::Zksync => "ZK",
            Chain::Linea => "LINEA",
            Chain::Celo => "CELO",
            Chain::Sonic => "SONIC",
        }
    }

    /// EIP-155 chain id.
    pub fn chain_id(self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Arbitrum => 42161,
            Chain::Avalanche => 43114,
            Chain::Base => 8453,
            Chain::Bnb => 56,
            Chain::Gnosis => 100,
            Chain::Metis => 1088,
            Chain::Optimism => 10,
            Chain::Polygon => 137,
            Chain::Scroll => 534352,
            Chain::Zksync => 324,
            Chain::Linea => 59144,
            Chain::Celo => 42220,
            Chain::Sonic => 146,
        }
    }

    pub fn from_chain_id(id: u64) -> Option<Chain> {
        Chain::ALL.iter().copied().find(|c| c.chain_id() == id)
    }

    fn supported_list() -> String {
        Chain::ALL.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = ChainParseError;

    /// Accepts either the display name or the short code, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Chain::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(needle) || c.code().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ChainParseError {
                input: s.to_string(),
                supported: Chain::supported_list(),
            })
    }
}

impl From<Chain> for String {
    fn from(chain: Chain) -> Self {
        chain.name().to_string()
    }
}

impl TryFrom<String> for Chain {
    type Error = ChainParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
