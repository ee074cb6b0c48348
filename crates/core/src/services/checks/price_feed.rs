//! Resolution of hard-coded addresses against price-feed and token registries.

use std::collections::BTreeSet;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use super::run::{CheckError, CheckRun};
use super::ProposalScope;
use crate::model::{strip_comments, AddressRecord, Chain, SourceUnit};
use crate::services::providers::{AddressProvider, ProviderError};

const ADDRESS_PATTERN: &str = r"\b0x[a-fA-F0-9]{40}\b";

#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error(transparent)]
    Check(#[from] CheckError),

    /// A provider cannot authenticate; continuing would report every
    /// address as unresolved.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid address pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Pulls address literals out of source code, ignoring comments.
#[derive(Debug, Clone)]
pub struct AddressExtractor {
    pattern: Regex,
}

impl AddressExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self { pattern: Regex::new(ADDRESS_PATTERN)? })
    }

    /// Lower-cased, deduplicated addresses in `text` outside of comments.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        let code = strip_comments(text);
        self.pattern.find_iter(&code).map(|m| m.as_str().to_ascii_lowercase()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    /// The literal is the registry's canonical address.
    Direct,
    /// The literal is a proxy in front of the canonical address.
    Proxy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAddress {
    pub file: String,
    pub address: String,
    pub provider: String,
    pub kind: HitKind,
    pub record: AddressRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedAddress {
    pub file: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceFeedFindings {
    pub price_feed_hits: Vec<ResolvedAddress>,
    pub token_hits: Vec<ResolvedAddress>,
    pub unresolved: Vec<UnresolvedAddress>,
    /// Non-fatal lookup failures; the affected lookups count as misses.
    pub lookup_errors: Vec<String>,
}

impl PriceFeedFindings {
    pub fn proxy_hits(&self) -> impl Iterator<Item = &ResolvedAddress> {
        self.price_feed_hits.iter().chain(&self.token_hits).filter(|h| h.kind == HitKind::Proxy)
    }
}

pub struct PriceFeedCheck<'a> {
    pub run: CheckRun,
    chain: Chain,
    price_feed_providers: &'a [AddressProvider],
    token_providers: &'a [AddressProvider],
    extractor: AddressExtractor,
}

impl<'a> PriceFeedCheck<'a> {
    pub const NAME: &'static str = "PriceFeedCheck";

    pub fn new(
        scope: &ProposalScope<'_>,
        price_feed_providers: &'a [AddressProvider],
        token_providers: &'a [AddressProvider],
    ) -> Result<Self, PriceFeedError> {
        Ok(Self {
            run: scope.start(Self::NAME)?,
            chain: scope.chain,
            price_feed_providers,
            token_providers,
            extractor: AddressExtractor::new()?,
        })
    }

    pub fn verify_price_feed(&self, units: &[SourceUnit]) -> Result<PriceFeedFindings, PriceFeedError> {
        let mut findings = PriceFeedFindings::default();

        for unit in units {
            let mut file_hits = Vec::new();
            for address in self.extractor.extract(&unit.text()) {
                if let Some(hit) = self.first_hit(self.price_feed_providers, unit, &address, &mut findings)? {
                    file_hits.push(hit.clone());
                    findings.price_feed_hits.push(hit);
                } else if let Some(hit) = self.first_hit(self.token_providers, unit, &address, &mut findings)? {
                    file_hits.push(hit.clone());
                    findings.token_hits.push(hit);
                } else {
                    findings.unresolved.push(UnresolvedAddress { file: unit.path().to_string(), address });
                }
            }
            if !file_hits.is_empty() {
                self.run.write_json(format!("{}/verified_sources.json", unit.stem()), &file_hits)?;
            }
        }

        print_summary(&findings);
        Ok(findings)
    }

    /// Ask `providers` in order; the first one that knows the address wins.
    fn first_hit(
        &self,
        providers: &[AddressProvider],
        unit: &SourceUnit,
        address: &str,
        findings: &mut PriceFeedFindings,
    ) -> Result<Option<ResolvedAddress>, PriceFeedError> {
        for provider in providers {
            match provider.resolve(self.chain, address) {
                Ok(Some(record)) => {
                    let kind = if record.is_proxy_hit(address) { HitKind::Proxy } else { HitKind::Direct };
                    return Ok(Some(ResolvedAddress {
                        file: unit.path().to_string(),
                        address: address.to_string(),
                        provider: provider.name().to_string(),
                        kind,
                        record,
                    }));
                }
                Ok(None) => {}
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(provider = provider.name(), %address, error = %err, "address lookup failed");
                    findings.lookup_errors.push(format!("{} {address}: {err}", provider.name()));
                }
            }
        }
        Ok(None)
    }
}

fn print_summary(findings: &PriceFeedFindings) {
    let describe = |hit: &ResolvedAddress| {
        let label = hit
            .record
            .symbol_or_pair
            .as_deref()
            .or(hit.record.display_name.as_deref())
            .unwrap_or("unnamed");
        match hit.kind {
            HitKind::Direct => format!("{} ({label}) via {}", hit.address, hit.provider),
            HitKind::Proxy => format!(
                "{} ({label}) via {} [proxy of {}]",
                hit.address, hit.provider, hit.record.primary_address
            ),
        }
    };

    println!("Price feed hits: {}", findings.price_feed_hits.len());
    for hit in &findings.price_feed_hits {
        println!("- {}: {}", hit.file, describe(hit));
    }
    println!("Token hits: {}", findings.token_hits.len());
    for hit in &findings.token_hits {
        println!("- {}: {}", hit.file, describe(hit));
    }
    println!("Unresolved addresses: {}", findings.unresolved.len());
    for miss in &findings.unresolved {
        println!("- {}: {}", miss.file, miss.address);
    }
}
