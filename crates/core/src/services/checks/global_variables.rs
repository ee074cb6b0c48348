use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::run::{CheckResult, CheckRun};
use super::ProposalScope;
use crate::model::{SourceUnit, VariableFacts};

/// Files whose sources could not be scanned, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalVariableFindings {
    /// File path to the variables that occupy mutable storage.
    pub violations: BTreeMap<String, Vec<VariableFacts>>,
    pub parse_failures: Vec<ParseFailure>,
}

impl GlobalVariableFindings {
    pub fn violation_count(&self) -> usize {
        self.violations.values().map(Vec::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Flags state variables that are neither `constant` nor `immutable`.
///
/// Only files with violations get an artifact (`{stem}.json`); a clean
/// proposal writes nothing.
pub struct GlobalVariableCheck {
    pub run: CheckRun,
}

impl GlobalVariableCheck {
    pub const NAME: &'static str = "GlobalVariableCheck";

    pub fn new(scope: &ProposalScope<'_>) -> CheckResult<Self> {
        Ok(Self { run: scope.start(Self::NAME)? })
    }

    pub fn check_global_variables(&self, units: &[SourceUnit]) -> CheckResult<GlobalVariableFindings> {
        let mut findings = GlobalVariableFindings::default();

        for unit in units {
            if let Some(reason) = unit.parse_outcome().failure_reason() {
                warn!(path = unit.path(), reason, "could not scan source; skipping storage check");
                findings.parse_failures.push(ParseFailure { path: unit.path().to_string(), reason: reason.to_string() });
                continue;
            }
            let flagged = mutable_storage(unit);
            if flagged.is_empty() {
                continue;
            }
            self.run.write_json(format!("{}.json", unit.stem()), &flagged)?;
            findings.violations.insert(unit.path().to_string(), flagged);
        }

        if findings.is_clean() {
            println!("All global variables are constant or immutable.");
        } else {
            println!("Global variables that are neither constant nor immutable:");
            for (path, variables) in &findings.violations {
                println!("- {path}:");
                for variable in variables {
                    println!("  - {} {}", variable.declared_type, variable.name);
                }
            }
        }
        Ok(findings)
    }
}

/// Variables of `unit` that are neither constant nor immutable.
pub fn mutable_storage(unit: &SourceUnit) -> Vec<VariableFacts> {
    unit.state_variables()
        .values()
        .filter(|v| !v.is_constant)
        .filter(|v| !v.is_immutable)
        .cloned()
        .collect()
}
