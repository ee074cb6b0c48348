use super::diff::{DiffCheck, ReconciliationResult};
use super::run::CheckResult;
use super::ProposalScope;
use crate::model::SourceUnit;

/// Second reconciliation pass over the files the trusted tree did not have,
/// against the customer's `review_module/` tree. A file found here is staged
/// for review rather than genuinely new.
pub struct ReviewDiffCheck {
    inner: DiffCheck,
}

impl ReviewDiffCheck {
    pub const NAME: &'static str = "ReviewDiffCheck";

    pub fn new(scope: &ProposalScope<'_>) -> CheckResult<Self> {
        let root = scope.layout.review_dir(scope.customer);
        println!("Review repo cloned under: {}", root.display());
        Ok(Self { inner: DiffCheck::against(scope, Self::NAME, &root)? })
    }

    pub fn run(&self) -> &super::CheckRun {
        &self.inner.run
    }

    pub fn find_diffs(&self, missing: &[SourceUnit]) -> CheckResult<ReconciliationResult> {
        self.inner.find_diffs(missing)
    }
}
