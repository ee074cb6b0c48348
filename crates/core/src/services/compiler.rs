//! Local recompilation of a proposal with Foundry.
//!
//! `forge build --contracts <target>` is run inside the forge project root
//! with a throwaway output directory. Sources come from the build-info file
//! and bytecode from the contract's artifact JSON.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::model::SourceUnit;

/// Environment override for the forge executable.
pub const FORGE_BIN_ENV: &str = "FORGE_BIN";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("forge executable '{0}' could not be started; is Foundry installed?")]
    ForgeNotFound(String),

    #[error("forge build failed ({status}): {stderr}")]
    BuildFailed { status: String, stderr: String },

    #[error("No artifact for contract {contract} under {}", out_dir.display())]
    MissingArtifact { contract: String, out_dir: PathBuf },

    #[error("No JSON file found in {}", .0.display())]
    NoBuildInfo(PathBuf),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
}

/// Bytecode produced by a local build, both hex encoded with `0x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledBytecode {
    pub contract_name: String,
    pub creation: String,
    pub runtime: String,
}

/// Local build capability used by the local payload and bytecode modes.
pub trait ChainCompiler {
    fn name(&self) -> &'static str;

    /// Build `target` inside `root` and return every source file that went
    /// into the build, the target first.
    fn compile(&self, root: &Path, target: &Path) -> Result<Vec<SourceUnit>, CompileError>;

    /// Build `target` inside `root` and return the bytecode of `contract_name`.
    fn build_bytecode(
        &self,
        root: &Path,
        target: &Path,
        contract_name: &str,
    ) -> Result<CompiledBytecode, CompileError>;
}

/// Shells out to `forge`.
#[derive(Debug, Clone)]
pub struct ForgeCompiler {
    forge_bin: PathBuf,
    /// Force `FOUNDRY_PROFILE=default` for the build.
    use_default_profile: bool,
}

impl Default for ForgeCompiler {
    fn default() -> Self {
        Self::new(resolve_forge_path())
    }
}

impl ForgeCompiler {
    pub fn new(forge_bin: impl Into<PathBuf>) -> Self {
        Self { forge_bin: forge_bin.into(), use_default_profile: false }
    }

    pub fn with_default_profile(mut self, enabled: bool) -> Self {
        self.use_default_profile = enabled;
        self
    }

    fn build(&self, root: &Path, target: &Path, out_dir: &Path) -> Result<(), CompileError> {
        let mut command = Command::new(&self.forge_bin);
        command
            .current_dir(root)
            .arg("build")
            .arg("--contracts")
            .arg(target)
            .arg("--out")
            .arg(out_dir);
        if self.use_default_profile {
            command.env("FOUNDRY_PROFILE", "default");
        }
        debug!(forge = %self.forge_bin.display(), root = %root.display(), target = %target.display(), "running forge build");

        let output = command.output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                CompileError::ForgeNotFound(self.forge_bin.display().to_string())
            }
            _ => CompileError::Io { path: self.forge_bin.clone(), source: e },
        })?;
        if !output.status.success() {
            return Err(CompileError::BuildFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl ChainCompiler for ForgeCompiler {
    fn name(&self) -> &'static str {
        "forge"
    }

    fn compile(&self, root: &Path, target: &Path) -> Result<Vec<SourceUnit>, CompileError> {
        let scratch = scratch_dir()?;
        let out_dir = scratch.path().join("out");
        self.build(root, target, &out_dir)?;

        let paths = read_build_info_sources(&out_dir.join("build-info"))?;
        Ok(load_source_units(root, &paths))
    }

    fn build_bytecode(
        &self,
        root: &Path,
        target: &Path,
        contract_name: &str,
    ) -> Result<CompiledBytecode, CompileError> {
        let scratch = scratch_dir()?;
        let out_dir = scratch.path().join("out");
        self.build(root, target, &out_dir)?;

        let artifact = find_artifact(&out_dir, contract_name).ok_or_else(|| {
            CompileError::MissingArtifact { contract: contract_name.to_string(), out_dir: out_dir.clone() }
        })?;
        read_artifact_bytecode(&artifact, contract_name)
    }
}

fn resolve_forge_path() -> PathBuf {
    std::env::var_os(FORGE_BIN_ENV).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("forge"))
}

fn scratch_dir() -> Result<tempfile::TempDir, CompileError> {
    tempfile::tempdir().map_err(|source| CompileError::Io { path: std::env::temp_dir(), source })
}

/// Source paths listed in the first build-info JSON, reversed so the
/// compiled target precedes its dependencies.
pub fn read_build_info_sources(build_info_dir: &Path) -> Result<Vec<String>, CompileError> {
    let entries = fs::read_dir(build_info_dir)
        .map_err(|_| CompileError::NoBuildInfo(build_info_dir.to_path_buf()))?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    candidates.sort();
    let path = candidates
        .into_iter()
        .next()
        .ok_or_else(|| CompileError::NoBuildInfo(build_info_dir.to_path_buf()))?;

    let body = fs::read_to_string(&path).map_err(|source| CompileError::Io { path: path.clone(), source })?;
    source_paths_from_build_info(&body)
        .map_err(|message| CompileError::Decode { path, message })
}

/// Extract source paths from a build-info document.
///
/// Newer forge writes `source_id_to_path` (ordered here by numeric id); the
/// standard-JSON `input.sources` keys are used otherwise.
pub fn source_paths_from_build_info(body: &str) -> Result<Vec<String>, String> {
    let json: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;

    let mut paths: Vec<String> = if let Some(map) = json.get("source_id_to_path").and_then(Value::as_object) {
        let mut numbered: Vec<(u64, String)> = map
            .iter()
            .filter_map(|(id, path)| Some((id.parse::<u64>().ok()?, path.as_str()?.to_string())))
            .collect();
        numbered.sort_by_key(|(id, _)| *id);
        numbered.into_iter().map(|(_, path)| path).collect()
    } else if let Some(sources) = json.pointer("/input/sources").and_then(Value::as_object) {
        sources.keys().cloned().collect()
    } else {
        return Err("neither source_id_to_path nor input.sources present".to_string());
    };

    paths.reverse();
    Ok(paths)
}

/// Read each path relative to `root`. Unreadable files are skipped with a warning.
pub fn load_source_units(root: &Path, paths: &[String]) -> Vec<SourceUnit> {
    let mut units = Vec::with_capacity(paths.len());
    for rel in paths {
        let full = root.join(rel);
        match fs::read_to_string(&full) {
            Ok(text) => units.push(SourceUnit::from_text(rel.clone(), &text)),
            Err(err) => warn!(path = %full.display(), error = %err, "skipping unreadable source"),
        }
    }
    units
}

/// Locate `{name}.json` in a forge output directory.
///
/// Tries `{name}.sol/{name}.json`, then `{name}/{name}.json`, then any
/// `{name}.json` below `out_dir` (first in sorted order).
pub fn find_artifact(out_dir: &Path, contract_name: &str) -> Option<PathBuf> {
    let file_name = format!("{contract_name}.json");
    let direct = [
        out_dir.join(format!("{contract_name}.sol")).join(&file_name),
        out_dir.join(contract_name).join(&file_name),
    ];
    if let Some(found) = direct.into_iter().find(|p| p.is_file()) {
        return Some(found);
    }

    WalkDir::new(out_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name().to_str() == Some(file_name.as_str()))
        .map(|entry| entry.into_path())
}

#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(default)]
    bytecode: Option<BytecodeObject>,
    #[serde(default, rename = "deployedBytecode")]
    deployed_bytecode: Option<BytecodeObject>,
}

#[derive(Debug, Deserialize)]
struct BytecodeObject {
    #[serde(default)]
    object: String,
}

/// Creation (`bytecode.object`) and runtime (`deployedBytecode.object`) code
/// from a forge artifact.
pub fn read_artifact_bytecode(path: &Path, contract_name: &str) -> Result<CompiledBytecode, CompileError> {
    let body = fs::read_to_string(path).map_err(|source| CompileError::Io { path: path.to_path_buf(), source })?;
    let artifact: Artifact = serde_json::from_str(&body)
        .map_err(|e| CompileError::Decode { path: path.to_path_buf(), message: e.to_string() })?;

    let creation = artifact.bytecode.map(|b| b.object).unwrap_or_default();
    let runtime = artifact.deployed_bytecode.map(|b| b.object).unwrap_or_default();
    if runtime.trim().is_empty() || runtime.trim() == "0x" {
        return Err(CompileError::Decode {
            path: path.to_path_buf(),
            message: "artifact has no deployedBytecode.object".to_string(),
        });
    }
    Ok(CompiledBytecode {
        contract_name: contract_name.to_string(),
        creation: with_hex_prefix(&creation),
        runtime: with_hex_prefix(&runtime),
    })
}

fn with_hex_prefix(code: &str) -> String {
    let code = code.trim();
    if code.is_empty() || code.starts_with("0x") {
        code.to_string()
    } else {
        format!("0x{code}")
    }
}
