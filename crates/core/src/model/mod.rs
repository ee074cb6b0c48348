//! Core data model shared by every check.
//!
//! - `Chain`: supported networks and their identifiers.
//! - `SourceUnit`: one fetched or compiled source file with lazily parsed facts.
//! - `VariableFacts` / `FunctionFacts`: structural facts recovered from Solidity.
//! - `AddressRecord`: what an address registry knows about an address.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

mod chain;
pub mod solidity;

pub use chain::{Chain, ChainParseError};
pub use solidity::{parse_source, strip_comments};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid address '{0}': expected 0x followed by 40 hex characters")]
pub struct InvalidAddress(pub String);

/// `0x` followed by exactly 40 hex digits.
pub fn is_valid_address(candidate: &str) -> bool {
    let Some(hex) = candidate.strip_prefix("0x").or_else(|| candidate.strip_prefix("0X")) else {
        return false;
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate and lower-case an address so it can be used as a lookup key.
pub fn normalize_address(candidate: &str) -> Result<String, InvalidAddress> {
    let trimmed = candidate.trim();
    if !is_valid_address(trimmed) {
        return Err(InvalidAddress(candidate.to_string()));
    }
    Ok(format!("0x{}", trimmed[2..].to_ascii_lowercase()))
}

/// A declared contract-level storage variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableFacts {
    pub name: String,
    pub declared_type: String,
    pub is_constant: bool,
    pub is_immutable: bool,
    /// Contract or library that declares the variable.
    pub contract: Option<String>,
}

impl VariableFacts {
    /// A variable occupies a mutable storage slot unless it is constant or immutable.
    pub fn is_mutable_storage(&self) -> bool {
        !self.is_constant && !self.is_immutable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFacts {
    pub name: String,
    pub visibility: Option<String>,
    pub contract: Option<String>,
}

/// Everything the scanner recovered from one file. Maps are ordered so that
/// artifacts and summaries are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFacts {
    pub state_variables: BTreeMap<String, VariableFacts>,
    pub functions: BTreeMap<String, FunctionFacts>,
}

static NO_FACTS: SourceFacts =
    SourceFacts { state_variables: BTreeMap::new(), functions: BTreeMap::new() };

/// Result of scanning a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(SourceFacts),
    Failed { reason: String },
}

impl ParseOutcome {
    /// Facts when parsing succeeded, empty facts otherwise.
    pub fn facts(&self) -> &SourceFacts {
        match self {
            ParseOutcome::Parsed(facts) => facts,
            ParseOutcome::Failed { .. } => &NO_FACTS,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            ParseOutcome::Parsed(_) => None,
            ParseOutcome::Failed { reason } => Some(reason),
        }
    }
}

/// One source file of a proposal, as fetched from an explorer or produced by
/// a local build.
///
/// Structural facts are computed on first access and cached; the unit itself
/// is never mutated after construction.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    path: String,
    lines: Vec<String>,
    facts: OnceLock<ParseOutcome>,
}

impl SourceUnit {
    pub fn new(path: impl Into<String>, lines: Vec<String>) -> Self {
        Self { path: path.into(), lines, facts: OnceLock::new() }
    }

    /// Build a unit from whole-file text, splitting on line breaks.
    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        Self::new(path, text.lines().map(str::to_string).collect())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Content joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Final path component (`src/Foo.sol` -> `Foo.sol`).
    pub fn file_name(&self) -> &str {
        Path::new(&self.path).file_name().and_then(|n| n.to_str()).unwrap_or(&self.path)
    }

    /// File name without extension, used to name per-file artifacts.
    pub fn stem(&self) -> &str {
        Path::new(&self.path).file_stem().and_then(|n| n.to_str()).unwrap_or(&self.path)
    }

    pub fn parse_outcome(&self) -> &ParseOutcome {
        self.facts.get_or_init(|| parse_source(&self.text()))
    }

    pub fn state_variables(&self) -> &BTreeMap<String, VariableFacts> {
        &self.parse_outcome().facts().state_variables
    }

    pub fn functions(&self) -> &BTreeMap<String, FunctionFacts> {
        &self.parse_outcome().facts().functions
    }

    /// SHA-256 of the joined text, hex encoded.
    pub fn content_hash(&self) -> String {
        format!("{:x}", Sha256::digest(self.text().as_bytes()))
    }
}

/// Digest over every unit's path and content, in order. Identifies the exact
/// source set a report was produced from.
pub fn source_digest(units: &[SourceUnit]) -> String {
    let mut hasher = Sha256::new();
    for unit in units {
        hasher.update(unit.path().as_bytes());
        hasher.update([0u8]);
        hasher.update(unit.text().as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Metadata a registry holds for an address.
///
/// `primary_address` is always the canonical (non-proxy) address. When a
/// lookup was made with `alternate_address` instead, the hit is a proxy hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub primary_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_or_pair: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl AddressRecord {
    pub fn new(primary_address: impl Into<String>) -> Self {
        Self {
            primary_address: primary_address.into(),
            alternate_address: None,
            display_name: None,
            symbol_or_pair: None,
            decimals: None,
        }
    }

    /// True when the record was found under an address other than its
    /// canonical one, i.e. the literal in source is a proxy.
    pub fn is_proxy_hit(&self, queried: &str) -> bool {
        !self.primary_address.eq_ignore_ascii_case(queried)
    }
}
