//! Reconciliation of fetched proposal files against a local trusted tree.
//!
//! Explorer paths rarely match a repository's layout verbatim
//! (`src/Foo.sol` vs `contracts/v2/src/Foo.sol`, or remapped `@oz/...`
//! imports vs `lib/openzeppelin-contracts/...`). Each remote path is matched
//! by its longest suffix that exists locally; when several local files share
//! that suffix, the one whose root-relative path is most similar to the
//! suffix wins, with the first in sorted order breaking ties.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use similar::TextDiff;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::run::{CheckError, CheckResult, CheckRun};
use super::ProposalScope;
use crate::model::SourceUnit;

/// A remote file and the local file it was reconciled with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedFile {
    pub remote_path: String,
    pub local_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffedFile {
    pub local_path: String,
    pub remote_path: String,
    pub diff: String,
}

/// Every remote unit ends up either in `matched_pairs` or in `missing_files`.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    pub matched_pairs: Vec<MatchedFile>,
    pub missing_files: Vec<SourceUnit>,
    pub diffed_files: Vec<DiffedFile>,
}

/// Counts carried into the proposal report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub identical: usize,
    pub diffed: usize,
    pub missing: usize,
    pub missing_files: Vec<String>,
    pub diffed_files: Vec<String>,
}

impl ReconciliationResult {
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            identical: self.matched_pairs.len() - self.diffed_files.len(),
            diffed: self.diffed_files.len(),
            missing: self.missing_files.len(),
            missing_files: self.missing_files.iter().map(|u| u.path().to_string()).collect(),
            diffed_files: self.diffed_files.iter().map(|d| d.remote_path.clone()).collect(),
        }
    }
}

/// Files below a root, as `/`-separated root-relative paths in sorted order.
/// `.git` directories are skipped.
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
    files: Vec<String>,
}

impl LocalTree {
    pub fn scan(root: &Path) -> Self {
        if !root.is_dir() {
            warn!(root = %root.display(), "local tree does not exist; every file will be reported missing");
            return Self { root: root.to_path_buf(), files: Vec::new() };
        }
        let files = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(root).ok()?;
                let parts: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
                Some(parts.join("/"))
            })
            .collect();
        Self { root: root.to_path_buf(), files }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Best local counterpart of `remote_path`, if any suffix of it exists.
    pub fn best_match(&self, remote_path: &str) -> Option<&str> {
        let components: Vec<&str> =
            remote_path.split(['/', '\\']).filter(|c| !c.is_empty() && *c != ".").collect();

        for start in 0..components.len() {
            let suffix = components[start..].join("/");
            let nested = format!("/{suffix}");
            let mut best: Option<(&str, f32)> = None;
            for candidate in self.files.iter().filter(|f| **f == suffix || f.ends_with(&nested)) {
                let score = similarity(&suffix, candidate);
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((candidate.as_str(), score));
                }
            }
            if let Some((path, score)) = best {
                debug!(remote = remote_path, local = path, score, "matched remote file");
                return Some(path);
            }
        }
        None
    }
}

/// Normalized character similarity in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio()
}

/// Line-level unified diff, empty when the contents are identical.
pub fn unified_diff(local_label: &str, local: &str, remote_label: &str, remote: &str) -> String {
    TextDiff::from_lines(local, remote).unified_diff().header(local_label, remote_label).to_string()
}

/// Diffs remote units against one local tree and writes a patch per differing file.
pub struct DiffCheck {
    pub run: CheckRun,
    tree: LocalTree,
}

impl DiffCheck {
    pub const NAME: &'static str = "DiffCheck";

    /// Compare against the customer's trusted `modules/` tree.
    pub fn new(scope: &ProposalScope<'_>) -> CheckResult<Self> {
        let root = scope.layout.modules_dir(scope.customer);
        Self::against(scope, Self::NAME, &root)
    }

    /// Compare against an arbitrary root under a given check name.
    pub fn against(scope: &ProposalScope<'_>, check_name: &str, root: &Path) -> CheckResult<Self> {
        let run = scope.start(check_name)?;
        Ok(Self { run, tree: LocalTree::scan(root) })
    }

    pub fn tree(&self) -> &LocalTree {
        &self.tree
    }

    pub fn find_diffs(&self, units: &[SourceUnit]) -> CheckResult<ReconciliationResult> {
        let mut result = ReconciliationResult::default();

        for unit in units {
            let Some(local_rel) = self.tree.best_match(unit.path()) else {
                result.missing_files.push(unit.clone());
                continue;
            };
            let local_path = self.tree.root().join(local_rel);
            let local_text = fs::read_to_string(&local_path)
                .map_err(|source| CheckError::Io { path: local_path.clone(), source })?;
            let local_lines: Vec<&str> = local_text.lines().collect();

            result.matched_pairs.push(MatchedFile {
                remote_path: unit.path().to_string(),
                local_path: local_rel.to_string(),
            });
            if local_lines.iter().copied().eq(unit.lines().iter().map(String::as_str)) {
                continue;
            }

            let diff = unified_diff(
                &local_path.display().to_string(),
                &with_newline(local_lines.join("\n")),
                unit.path(),
                &with_newline(unit.text()),
            );
            let stem = Path::new(local_rel).file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            self.run.write_text(format!("{stem}.patch"), &diff)?;
            result.diffed_files.push(DiffedFile {
                local_path: local_rel.to_string(),
                remote_path: unit.path().to_string(),
                diff,
            });
        }

        print_summary(&self.run.check_name, self.tree.root(), &result);
        Ok(result)
    }
}

fn with_newline(mut text: String) -> String {
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

fn print_summary(check_name: &str, root: &Path, result: &ReconciliationResult) {
    let summary = result.summary();
    let total = result.matched_pairs.len() + result.missing_files.len();
    println!("{check_name} against {}:", root.display());
    println!("- compared: {}/{total}", result.matched_pairs.len());
    println!("- identical: {}", summary.identical);
    println!("- diffed: {}", summary.diffed);
    for file in &result.diffed_files {
        println!("  - {} <-> {}", file.remote_path, file.local_path);
    }
    println!("- missing: {}", summary.missing);
    for path in &summary.missing_files {
        println!("  - {path}");
    }
}
