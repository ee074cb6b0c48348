//! Keeps a customer's reference repositories present and current.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::info;

use crate::project::{repo_dir_name, split_repo_branch, CustomerContext, QuorumLayout};

pub const GIT_BIN_ENV: &str = "GIT_BIN";

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`git {args}` failed ({status}): {stderr}")]
    Failed { args: String, status: String, stderr: String },

    #[error("Failed to create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Brings the trusted tree (`modules/`) and the optional review tree
/// (`review_module/`) of a customer up to date.
pub trait GitSync {
    fn clone_or_update(&self, layout: &QuorumLayout, customer: &CustomerContext) -> Result<(), GitError>;
}

/// `GitSync` backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    git_bin: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        let git_bin = std::env::var_os(GIT_BIN_ENV).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("git"));
        Self { git_bin }
    }
}

impl GitCli {
    pub fn new(git_bin: impl Into<PathBuf>) -> Self {
        Self { git_bin: git_bin.into() }
    }

    fn sync_repo(&self, repo: &str, parent: &Path) -> Result<(), GitError> {
        let (url, branch) = split_repo_branch(repo);
        let name = repo_dir_name(repo);
        let target = parent.join(&name);

        if target.exists() {
            info!(repo = %name, path = %target.display(), "updating repository");
            println!("Repository {name} already exists at {}. Updating repo.", target.display());
            if let Some(branch) = branch {
                self.run(Some(&target), &["checkout", branch])?;
            }
            self.run(Some(&target), &["pull"])?;
            self.run(Some(&target), &["submodule", "update", "--init", "--recursive"])?;
        } else {
            info!(repo = %name, %url, "cloning repository");
            println!("Cloning {name} from URL: {url} to {}...", target.display());
            let target_str = target.to_string_lossy();
            let mut args = vec!["clone", "--recurse-submodules"];
            if let Some(branch) = branch {
                args.extend(["--branch", branch]);
            }
            args.extend([url, &*target_str]);
            self.run(None, &args)?;
        }
        Ok(())
    }

    fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<(), GitError> {
        let mut command = Command::new(&self.git_bin);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        let output = command.output().map_err(|source| GitError::Spawn {
            program: self.git_bin.display().to_string(),
            source,
        })?;
        if !output.status.success() {
            return Err(GitError::Failed {
                args: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl GitSync for GitCli {
    fn clone_or_update(&self, layout: &QuorumLayout, customer: &CustomerContext) -> Result<(), GitError> {
        let modules = layout.modules_dir(&customer.name);
        let review = layout.review_dir(&customer.name);
        for dir in [&modules, &review] {
            fs::create_dir_all(dir).map_err(|source| GitError::Io { path: dir.clone(), source })?;
        }

        for repo in &customer.config.dev_repos {
            self.sync_repo(repo, &modules)?;
        }
        if let Some(repo) = &customer.config.review_repo {
            self.sync_repo(repo, &review)?;
        }
        Ok(())
    }
}
