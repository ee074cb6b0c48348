//! Ordered execution of every check for one proposal.
//!
//! Source units are fetched once and threaded read-only through the checks.
//! The diff stage decides what the later stages look at: only files that the
//! trusted tree does not contain are inspected for storage variables,
//! hard-coded addresses and listings.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{normalize_address, source_digest, Chain, SourceUnit};
use crate::project::QuorumLayout;
use crate::services::bytecode::{BytecodeAnalysisResult, BytecodeAnalyzer, ChainRpc};
use crate::services::checks::{
    CheckError, DiffCheck, DiffSummary, GlobalVariableCheck, GlobalVariableFindings, ListingExtractor,
    NewListingCheck, NewListingOutcome, PriceFeedCheck, PriceFeedError, PriceFeedFindings, ProposalScope,
    ReviewDiffCheck,
};
use crate::services::explorer::{ExplorerError, SourceProvider};
use crate::services::governance::PayloadAddresses;
use crate::services::providers::AddressProvider;

pub const REPORT_CHECK_NAME: &str = "ProposalReport";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Explorer(#[from] ExplorerError),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    PriceFeed(#[from] PriceFeedError),
}

/// Bytecode stage of a report: the analysis, or why it is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BytecodeStage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<BytecodeAnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of a completed proposal run, written to `report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalReport {
    pub customer: String,
    pub chain: Chain,
    pub proposal_id: String,
    pub generated_at: String,
    /// SHA-256 over the fetched source set.
    pub source_digest: String,
    pub files: usize,
    pub diff: DiffSummary,
    pub review_diff: DiffSummary,
    pub global_variables: GlobalVariableFindings,
    pub price_feeds: PriceFeedFindings,
    pub new_listings: NewListingOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<BytecodeStage>,
}

#[derive(Debug, Clone)]
pub enum ProposalOutcome {
    Completed(Box<ProposalReport>),
    /// A fatal condition stopped the checks for this proposal only.
    Aborted { reason: String },
}

impl ProposalOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ProposalOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&ProposalReport> {
        match self {
            ProposalOutcome::Completed(report) => Some(report),
            ProposalOutcome::Aborted { .. } => None,
        }
    }
}

/// Everything the checks need for one customer, injected by the caller.
pub struct ProposalPipeline<'a> {
    layout: &'a QuorumLayout,
    customer: &'a str,
    price_feed_providers: &'a [AddressProvider],
    token_providers: &'a [AddressProvider],
    listing_extractor: Option<&'a dyn ListingExtractor>,
    rpc: Option<&'a dyn ChainRpc>,
}

impl<'a> ProposalPipeline<'a> {
    pub fn new(
        layout: &'a QuorumLayout,
        customer: &'a str,
        price_feed_providers: &'a [AddressProvider],
        token_providers: &'a [AddressProvider],
    ) -> Self {
        Self { layout, customer, price_feed_providers, token_providers, listing_extractor: None, rpc: None }
    }

    pub fn with_listing_extractor(mut self, extractor: &'a dyn ListingExtractor) -> Self {
        self.listing_extractor = Some(extractor);
        self
    }

    /// Also analyze the deployed bytecode of each proposal.
    pub fn with_bytecode(mut self, rpc: &'a dyn ChainRpc) -> Self {
        self.rpc = Some(rpc);
        self
    }

    /// Fetch the proposal's verified source and run every check on it.
    pub fn run(&self, chain: Chain, address: &str, sources: &dyn SourceProvider) -> ProposalOutcome {
        println!("Analyzing payload {address} on {chain}");
        let units = match sources.source_code(address) {
            Ok(units) => units,
            Err(ExplorerError::Unverified { .. }) => {
                println!("Payload address {address} is not verified on {chain} explorer.");
                println!("We do not recommend to approve this proposal until the code is approved!");
                println!("Try contacting the proposer and ask them to verify the contract.");
                println!("No further checks are being performed on this payload.");
                return ProposalOutcome::Aborted {
                    reason: format!("Payload address {address} is not verified on {chain} explorer"),
                };
            }
            Err(err) => {
                warn!(%address, %chain, error = %err, "could not fetch source code");
                return ProposalOutcome::Aborted { reason: err.to_string() };
            }
        };
        self.run_with_sources(chain, address, &units)
    }

    /// Run every check on already obtained sources (local payload mode).
    pub fn run_with_sources(&self, chain: Chain, proposal_id: &str, units: &[SourceUnit]) -> ProposalOutcome {
        match self.execute(chain, proposal_id, units) {
            Ok(report) => ProposalOutcome::Completed(Box::new(report)),
            Err(err) => {
                warn!(proposal = proposal_id, %chain, error = %err, "proposal checks aborted");
                println!("Checks aborted for {proposal_id}: {err}");
                ProposalOutcome::Aborted { reason: err.to_string() }
            }
        }
    }

    /// Run several proposals of one chain; each outcome is independent.
    pub fn run_all(
        &self,
        chain: Chain,
        addresses: &[String],
        sources: &dyn SourceProvider,
    ) -> Vec<(String, ProposalOutcome)> {
        addresses.iter().map(|address| (address.clone(), self.run(chain, address, sources))).collect()
    }

    /// Run every payload of a governance proposal on its own chain.
    ///
    /// `explorer_for` is asked once per payload; when it fails, or an address
    /// is malformed, only the affected payload addresses are aborted.
    pub fn run_payloads<F>(
        &self,
        payloads: &[PayloadAddresses],
        mut explorer_for: F,
    ) -> Vec<(Chain, String, ProposalOutcome)>
    where
        F: FnMut(Chain) -> Result<Box<dyn SourceProvider>, ExplorerError>,
    {
        let mut outcomes = Vec::new();
        for payload in payloads {
            let chain = payload.chain;
            let explorer = match explorer_for(chain) {
                Ok(explorer) => explorer,
                Err(err) => {
                    warn!(%chain, error = %err, "no explorer for payload chain");
                    outcomes.extend(payload.addresses.iter().map(|address| {
                        (chain, address.clone(), ProposalOutcome::Aborted { reason: err.to_string() })
                    }));
                    continue;
                }
            };
            for raw in &payload.addresses {
                let outcome = match normalize_address(raw) {
                    Ok(address) => self.run(chain, &address, explorer.as_ref()),
                    Err(err) => ProposalOutcome::Aborted { reason: err.to_string() },
                };
                outcomes.push((chain, raw.clone(), outcome));
            }
        }
        outcomes
    }

    fn execute(&self, chain: Chain, proposal_id: &str, units: &[SourceUnit]) -> Result<ProposalReport, PipelineError> {
        let scope = ProposalScope::new(self.layout, self.customer, chain, proposal_id);
        info!(customer = self.customer, %chain, proposal = proposal_id, files = units.len(), "running proposal checks");

        println!("Check 1 - Comparing payload contract and imports with the source of truth");
        let diff = DiffCheck::new(&scope)?.find_diffs(units)?;
        let missing = &diff.missing_files;

        println!("Check 2 - Verifying missing files against customer review repo");
        let review = ReviewDiffCheck::new(&scope)?.find_diffs(missing)?;

        println!("Check 3 - Global variables");
        let global_variables = GlobalVariableCheck::new(&scope)?.check_global_variables(missing)?;

        println!("Check 4 - Explicit addresses validation");
        let price_feeds = PriceFeedCheck::new(&scope, self.price_feed_providers, self.token_providers)?
            .verify_price_feed(missing)?;

        println!("Check 5 - First deposit for new listing");
        let new_listings = NewListingCheck::new(&scope, self.listing_extractor)?.new_listing_check(missing)?;

        let bytecode = self.rpc.map(|rpc| {
            println!("Check 6 - Deployed bytecode");
            match BytecodeAnalyzer::new(rpc).analyze(proposal_id) {
                Ok(analysis) => {
                    println!("{}", analysis.summary());
                    BytecodeStage { analysis: Some(analysis), error: None }
                }
                Err(err) => {
                    warn!(proposal = proposal_id, error = %err, "bytecode analysis failed");
                    println!("Bytecode analysis failed: {err}");
                    BytecodeStage { analysis: None, error: Some(err.to_string()) }
                }
            }
        });

        let report = ProposalReport {
            customer: self.customer.to_string(),
            chain,
            proposal_id: proposal_id.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            source_digest: source_digest(units),
            files: units.len(),
            diff: diff.summary(),
            review_diff: review.summary(),
            global_variables,
            price_feeds,
            new_listings,
            bytecode,
        };
        let run = scope.start(REPORT_CHECK_NAME)?;
        let path = run.write_json("report.json", &report)?;
        println!("Report written to {}", path.display());
        Ok(report)
    }
}
