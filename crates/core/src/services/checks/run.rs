use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::model::Chain;
use crate::project::QuorumLayout;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize artifact {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type CheckResult<T> = Result<T, CheckError>;

/// Output directory of one check execution.
///
/// The directory is created eagerly so that two runs can never share one:
/// a run that finds its `{Name}_{timestamp}` name taken appends `_1`, `_2`...
#[derive(Debug, Clone)]
pub struct CheckRun {
    pub customer: String,
    pub chain: Chain,
    pub proposal_id: String,
    pub check_name: String,
    pub timestamp: DateTime<Local>,
    pub output_dir: PathBuf,
}

impl CheckRun {
    pub fn create(
        layout: &QuorumLayout,
        customer: &str,
        chain: Chain,
        proposal_id: &str,
        check_name: &str,
    ) -> CheckResult<Self> {
        let parent = layout.proposal_checks_dir(customer, chain.name(), proposal_id);
        fs::create_dir_all(&parent).map_err(|source| CheckError::Io { path: parent.clone(), source })?;

        let timestamp = Local::now();
        let base = format!("{check_name}_{}", timestamp.format("%Y%m%d_%H%M%S"));
        let mut suffix = 0u32;
        let output_dir = loop {
            let name = if suffix == 0 { base.clone() } else { format!("{base}_{suffix}") };
            let candidate = parent.join(name);
            match fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(source) => return Err(CheckError::Io { path: candidate, source }),
            }
        };

        Ok(Self {
            customer: customer.to_string(),
            chain,
            proposal_id: proposal_id.to_string(),
            check_name: check_name.to_string(),
            timestamp,
            output_dir,
        })
    }

    /// Append pretty JSON to `relative` (created with its parents if needed).
    pub fn write_json<T: Serialize + ?Sized>(&self, relative: impl AsRef<Path>, data: &T) -> CheckResult<PathBuf> {
        let path = self.output_dir.join(relative);
        let body = serde_json::to_string_pretty(data)
            .map_err(|source| CheckError::Serialize { path: path.clone(), source })?;
        append(&path, &body)?;
        Ok(path)
    }

    /// Append plain text to `relative`.
    pub fn write_text(&self, relative: impl AsRef<Path>, text: &str) -> CheckResult<PathBuf> {
        let path = self.output_dir.join(relative);
        append(&path, text)?;
        Ok(path)
    }
}

fn append(path: &Path, body: &str) -> CheckResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CheckError::Io { path: parent.to_path_buf(), source })?;
    }
    let io_err = |source| CheckError::Io { path: path.to_path_buf(), source };
    let mut file = OpenOptions::new().create(true).append(true).open(path).map_err(io_err)?;
    file.write_all(body.as_bytes()).map_err(io_err)?;
    if !body.ends_with('\n') {
        file.write_all(b"\n").map_err(io_err)?;
    }
    Ok(())
}

/// A check run directory found on disk, for run discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunListing {
    pub chain: String,
    pub proposal: String,
    pub check_name: String,
    pub directory: String,
    pub artifacts: usize,
}

/// List `{chain}/{proposal}/{Check}_{timestamp}` directories under a
/// customer's checks folder, sorted by path. Missing folders list nothing.
pub fn list_runs(
    layout: &QuorumLayout,
    customer: &str,
    chain: Option<Chain>,
    proposal: Option<&str>,
) -> CheckResult<Vec<RunListing>> {
    let root = layout.checks_dir(customer);
    let mut out = Vec::new();
    for chain_dir in sorted_dirs(&root)? {
        let chain_name = file_name(&chain_dir);
        if let Some(wanted) = chain {
            if !chain_name.eq_ignore_ascii_case(wanted.name()) {
                continue;
            }
        }
        for proposal_dir in sorted_dirs(&chain_dir)? {
            let proposal_name = file_name(&proposal_dir);
            if let Some(wanted) = proposal {
                if proposal_name != crate::project::proposal_dir_name(wanted) {
                    continue;
                }
            }
            for run_dir in sorted_dirs(&proposal_dir)? {
                let directory = file_name(&run_dir);
                let check_name = check_name_of(&directory);
                out.push(RunListing {
                    chain: chain_name.clone(),
                    proposal: proposal_name.clone(),
                    check_name,
                    artifacts: count_files(&run_dir),
                    directory,
                });
            }
        }
    }
    Ok(out)
}

/// `DiffCheck_20250101_120000_1` -> `DiffCheck`.
fn check_name_of(directory: &str) -> String {
    let mut parts: Vec<&str> = directory.split('_').collect();
    while parts.len() > 1 && parts.last().is_some_and(|p| p.chars().all(|c| c.is_ascii_digit())) {
        parts.pop();
    }
    parts.join("_")
}

fn sorted_dirs(dir: &Path) -> CheckResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(CheckError::Io { path: dir.to_path_buf(), source }),
    };
    let mut dirs: Vec<PathBuf> =
        entries.filter_map(|e| e.ok().map(|e| e.path())).filter(|p| p.is_dir()).collect();
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn count_files(dir: &Path) -> usize {
    walkdir::WalkDir::new(dir).into_iter().filter_map(Result::ok).filter(|e| e.file_type().is_file()).count()
}
