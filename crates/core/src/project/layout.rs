use std::path::{Path, PathBuf};

/// Logical layout of a Quorum working directory.
///
/// This is derived from the main path (`QUORUM_PATH`). It does *not* perform
/// any IO itself; callers create directories when they first write into them.
///
/// ```text
/// {root}/
///   ground_truth.json          per-customer configuration
///   execution.json             batch file for validate-batch
///   .quorum/address_cache.db   address resolution cache
///   {customer}/modules/        trusted reference repositories
///   {customer}/review_module/  optional review repository
///   {customer}/checks/{chain}/{proposal}/{Check}_{timestamp}/
/// ```
#[derive(Debug, Clone)]
pub struct QuorumLayout {
    /// Main working directory.
    pub root: PathBuf,
    /// Directory for internal metadata (.quorum).
    pub meta_dir: PathBuf,
    /// Path to the address cache database.
    pub cache_db_path: PathBuf,
    /// Default location of the ground truth file (JSON).
    pub ground_truth_path: PathBuf,
    /// Default location of the batch execution file (JSON).
    pub execution_path: PathBuf,
}

impl QuorumLayout {
    /// Compute the layout for a working directory rooted at `root`.
    ///
    /// This does *not* touch the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".quorum");
        let cache_db_path = meta_dir.join("address_cache.db");
        let ground_truth_path = root.join("ground_truth.json");
        let execution_path = root.join("execution.json");

        Self { root, meta_dir, cache_db_path, ground_truth_path, execution_path }
    }

    /// Ground truth candidates in lookup order (JSON first, then YAML).
    pub fn ground_truth_candidates(&self) -> [PathBuf; 3] {
        [
            self.ground_truth_path.clone(),
            self.root.join("ground_truth.yaml"),
            self.root.join("ground_truth.yml"),
        ]
    }

    pub fn customer_dir(&self, customer: &str) -> PathBuf {
        self.root.join(customer)
    }

    /// Trusted reference tree searched by the diff check.
    pub fn modules_dir(&self, customer: &str) -> PathBuf {
        self.customer_dir(customer).join("modules")
    }

    /// Secondary tree searched by the review diff check.
    pub fn review_dir(&self, customer: &str) -> PathBuf {
        self.customer_dir(customer).join("review_module")
    }

    pub fn checks_dir(&self, customer: &str) -> PathBuf {
        self.customer_dir(customer).join("checks")
    }

    /// Parent directory of every check run for one proposal.
    pub fn proposal_checks_dir(&self, customer: &str, chain: &str, proposal: &str) -> PathBuf {
        self.checks_dir(customer).join(chain).join(proposal_dir_name(proposal))
    }

    /// Clone target for a repository URL under `modules/`, named after the
    /// last path segment without a `.git` suffix.
    pub fn repo_clone_dir(&self, customer: &str, repo_url: &str) -> PathBuf {
        self.modules_dir(customer).join(repo_dir_name(repo_url))
    }
}

/// Split a `url@branch` repository string. An `@` that precedes the path (as
/// in `git@host:org/repo`) is part of the URL, not a branch separator.
pub fn split_repo_branch(repo: &str) -> (&str, Option<&str>) {
    match repo.rsplit_once('@') {
        Some((url, branch))
            if !branch.is_empty() && !branch.contains(['/', ':']) && url.contains('/') =>
        {
            (url, Some(branch))
        }
        _ => (repo, None),
    }
}

/// Last segment of a repository URL, minus any `.git` suffix and branch.
pub fn repo_dir_name(repo_url: &str) -> String {
    let (url, _) = split_repo_branch(repo_url);
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Proposal ids are usually addresses, but local payloads use file paths;
/// flatten separators so every id is a single directory component.
pub fn proposal_dir_name(proposal: &str) -> String {
    let flat: String = proposal
        .trim_matches(|c| c == '/' || c == '\\')
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    if flat.chars().all(|c| c == '.') {
        return "_".repeat(flat.len().max(1));
    }
    flat
}
