//! Proposal checks.
//!
//! Every check owns a `CheckRun` (its own timestamped output directory) and
//! writes artifacts only there. Checks never read each other's artifacts;
//! what one stage hands the next travels as return values.

mod diff;
mod global_variables;
mod new_listing;
mod price_feed;
mod review_diff;
mod run;

pub use diff::*;
pub use global_variables::*;
pub use new_listing::*;
pub use price_feed::*;
pub use review_diff::*;
pub use run::*;

use crate::model::Chain;
use crate::project::QuorumLayout;

/// The proposal a set of checks runs for.
#[derive(Debug, Clone, Copy)]
pub struct ProposalScope<'a> {
    pub layout: &'a QuorumLayout,
    pub customer: &'a str,
    pub chain: Chain,
    pub proposal_id: &'a str,
}

impl<'a> ProposalScope<'a> {
    pub fn new(layout: &'a QuorumLayout, customer: &'a str, chain: Chain, proposal_id: &'a str) -> Self {
        Self { layout, customer, chain, proposal_id }
    }

    /// Create the output directory for one check.
    pub fn start(&self, check_name: &str) -> CheckResult<CheckRun> {
        CheckRun::create(self.layout, self.customer, self.chain, self.proposal_id, check_name)
    }
}
