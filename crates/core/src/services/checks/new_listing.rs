use serde::{Deserialize, Serialize};
use tracing::warn;

use super::run::{CheckResult, CheckRun};
use super::ProposalScope;
use crate::model::SourceUnit;

/// Functions whose presence marks a payload as listing new assets.
pub const LISTING_FUNCTIONS: [&str; 2] = ["newListings", "newListingsCustom"];

/// One asset a payload lists, as reported by a `ListingExtractor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingDetails {
    pub asset_symbol: String,
    pub asset_address: String,
    pub supply_seed_amount: Option<f64>,
    /// Whether the payload supplies a seed amount for the asset.
    pub supply_indicator: bool,
    /// Whether the payload approves the asset before supplying.
    pub approve_indicator: bool,
}

impl ListingDetails {
    /// A listing is seeded when the payload both approves and supplies the
    /// first deposit.
    pub fn is_seeded(&self) -> bool {
        self.approve_indicator && self.supply_indicator
    }
}

/// Reads listing details out of a payload's source. Implementations may be
/// backed by anything from a pattern matcher to a hosted model.
pub trait ListingExtractor {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the extractor ran but found nothing usable.
    fn extract(&self, proposal_source: &str) -> Result<Option<Vec<ListingDetails>>, String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "listings", rename_all = "snake_case")]
pub enum NewListingOutcome {
    NoListings,
    /// Listing functions are present but no extractor is configured.
    Skipped,
    ExtractionFailed,
    Listed(Vec<ListingDetails>),
}

pub struct NewListingCheck<'a> {
    pub run: CheckRun,
    extractor: Option<&'a dyn ListingExtractor>,
}

impl<'a> NewListingCheck<'a> {
    pub const NAME: &'static str = "NewListingCheck";

    pub fn new(scope: &ProposalScope<'_>, extractor: Option<&'a dyn ListingExtractor>) -> CheckResult<Self> {
        Ok(Self { run: scope.start(Self::NAME)?, extractor })
    }

    pub fn new_listing_check(&self, units: &[SourceUnit]) -> CheckResult<NewListingOutcome> {
        let proposal = &self.run.proposal_id;
        if !has_listing_functions(units) {
            println!("No new listings detected for {proposal}");
            return Ok(NewListingOutcome::NoListings);
        }
        println!("New listings detected for payload {proposal}");

        let Some(extractor) = self.extractor else {
            println!("New listings were detected in payload but first deposit check is skipped (no listing extractor configured).");
            return Ok(NewListingOutcome::Skipped);
        };
        let source = units.first().map(SourceUnit::text).unwrap_or_default();
        let listings = match extractor.extract(&source) {
            Ok(Some(listings)) => listings,
            Ok(None) => {
                println!("New listings were detected in payload but {} failed to retrieve them.", extractor.name());
                return Ok(NewListingOutcome::ExtractionFailed);
            }
            Err(err) => {
                warn!(extractor = extractor.name(), error = %err, "listing extraction failed");
                return Ok(NewListingOutcome::ExtractionFailed);
            }
        };

        println!("{} new asset listings were detected:", listings.len());
        for (i, listing) in listings.iter().enumerate() {
            println!("{}. {} ({})", i + 1, listing.asset_symbol, listing.asset_address);
            println!("   - approve indicator: {}", listing.approve_indicator);
            println!("   - supply seed amount: {:?}", listing.supply_seed_amount);
            println!("   - supply indicator: {}", listing.supply_indicator);
            if listing.is_seeded() {
                println!("   - first deposit: seeded");
            } else {
                println!("   - first deposit: MISSING, the payload does not approve and supply a seed amount");
                warn!(asset = %listing.asset_symbol, proposal = %proposal, "new listing without first deposit");
            }
        }
        self.run.write_json("new_listings.json", &listings)?;
        Ok(NewListingOutcome::Listed(listings))
    }
}

pub fn has_listing_functions(units: &[SourceUnit]) -> bool {
    units.iter().any(|unit| LISTING_FUNCTIONS.iter().any(|name| unit.functions().contains_key(*name)))
}
