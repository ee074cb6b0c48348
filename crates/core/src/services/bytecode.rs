//! Deployed bytecode retrieval and comparison.
//!
//! `BytecodeAnalyzer` pulls the runtime code at an address and the input of
//! the transaction that created it, then tries to recover the ABI-encoded
//! constructor arguments by locating the runtime code inside the creation
//! code. The recovery is a heuristic: optimizer output and immutable
//! variables can rewrite the runtime code so it no longer appears verbatim,
//! in which case extraction reports `NotLocated` instead of failing.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::services::compiler::CompiledBytecode;

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error(
        "No runtime bytecode found at {address}. It might be a regular account or an unverified contract."
    )]
    NoRuntimeBytecode { address: String },

    #[error("{0}")]
    Rpc(#[from] RpcError),

    #[error("Invalid hex in {what}: {source}")]
    InvalidHex {
        what: &'static str,
        #[source]
        source: hex::FromHexError,
    },
}

/// Failure reported by a `ChainRpc` implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RpcError(pub String);

/// Chain access needed to analyze a deployed contract.
pub trait ChainRpc {
    /// Hex code at `address` (`0x` or empty for accounts without code).
    fn runtime_code(&self, address: &str) -> Result<String, RpcError>;

    /// Hash of the transaction that deployed `address`.
    fn creation_tx_hash(&self, address: &str) -> Result<String, RpcError>;

    /// Hex input data of a transaction.
    fn transaction_input(&self, tx_hash: &str) -> Result<String, RpcError>;
}

/// Outcome of constructor argument recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "args", rename_all = "snake_case")]
pub enum ArgsExtraction {
    /// One of the two bytecodes was unavailable.
    NotAttempted,
    /// Creation code ends with the runtime code: nothing appended.
    NoArguments,
    /// Bytes after the runtime code, `0x`-prefixed.
    Extracted(String),
    /// Runtime code does not occur inside the creation code.
    NotLocated,
}

impl ArgsExtraction {
    pub fn args_hex(&self) -> &str {
        match self {
            ArgsExtraction::Extracted(args) => args,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeAnalysisResult {
    pub runtime_bytecode: String,
    pub creation_bytecode: String,
    /// Empty unless extraction succeeded. An empty value with no error is a
    /// valid outcome.
    pub constructor_args: String,
    pub extraction: ArgsExtraction,
    pub errors: Vec<String>,
}

impl BytecodeAnalysisResult {
    pub fn has_creation_bytecode(&self) -> bool {
        !is_empty_code(&self.creation_bytecode)
    }

    pub fn has_constructor_args(&self) -> bool {
        !self.constructor_args.is_empty()
    }

    /// One line per component, for terminal output.
    pub fn summary(&self) -> String {
        let mark = |ok: bool| if ok { "yes" } else { "no" };
        let extraction = match &self.extraction {
            ArgsExtraction::NotAttempted => "not attempted".to_string(),
            ArgsExtraction::NoArguments => "none appended".to_string(),
            ArgsExtraction::Extracted(args) => format!("{} bytes", hex_len(args)),
            ArgsExtraction::NotLocated => "could not extract".to_string(),
        };
        format!(
            "Runtime bytecode: {} ({} bytes)\nCreation bytecode: {} ({} bytes)\nConstructor args: {}\nErrors: {}",
            mark(!is_empty_code(&self.runtime_bytecode)),
            hex_len(&self.runtime_bytecode),
            mark(self.has_creation_bytecode()),
            hex_len(&self.creation_bytecode),
            extraction,
            self.errors.len()
        )
    }
}

pub struct BytecodeAnalyzer<'a> {
    pub rpc: &'a dyn ChainRpc,
}

impl<'a> BytecodeAnalyzer<'a> {
    pub fn new(rpc: &'a dyn ChainRpc) -> Self {
        Self { rpc }
    }

    /// Runtime code is mandatory; everything after it is best effort and
    /// lands in `errors` when it fails.
    pub fn analyze(&self, address: &str) -> Result<BytecodeAnalysisResult, BytecodeError> {
        let runtime = self.rpc.runtime_code(address)?;
        if is_empty_code(&runtime) {
            return Err(BytecodeError::NoRuntimeBytecode { address: address.to_string() });
        }

        let mut result = BytecodeAnalysisResult {
            runtime_bytecode: runtime,
            creation_bytecode: String::new(),
            constructor_args: String::new(),
            extraction: ArgsExtraction::NotAttempted,
            errors: Vec::new(),
        };

        match self.creation_bytecode(address) {
            Ok(creation) => result.creation_bytecode = creation,
            Err(err) => {
                warn!(%address, error = %err, "creation bytecode unavailable");
                result.errors.push(format!("Creation bytecode error: {err}"));
                return Ok(result);
            }
        }

        match extract_constructor_args(&result.creation_bytecode, &result.runtime_bytecode) {
            Ok(extraction) => {
                if extraction == ArgsExtraction::NotLocated {
                    debug!(%address, "runtime code not found inside creation code");
                }
                result.constructor_args = extraction.args_hex().to_string();
                result.extraction = extraction;
            }
            Err(err) => result.errors.push(format!("Constructor args error: {err}")),
        }
        Ok(result)
    }

    fn creation_bytecode(&self, address: &str) -> Result<String, RpcError> {
        let tx_hash = self.rpc.creation_tx_hash(address)?;
        if tx_hash.trim().is_empty() {
            return Err(RpcError("Could not find creation transaction hash".to_string()));
        }
        let input = self.rpc.transaction_input(&tx_hash)?;
        if is_empty_code(&input) {
            return Err(RpcError("No creation bytecode found in transaction".to_string()));
        }
        Ok(input)
    }
}

/// Recover constructor arguments from creation and runtime code (hex).
pub fn extract_constructor_args(
    creation_hex: &str,
    runtime_hex: &str,
) -> Result<ArgsExtraction, BytecodeError> {
    if is_empty_code(creation_hex) || is_empty_code(runtime_hex) {
        return Ok(ArgsExtraction::NotAttempted);
    }
    let creation = decode_hex(creation_hex, "creation bytecode")?;
    let runtime = decode_hex(runtime_hex, "runtime bytecode")?;

    if creation.ends_with(&runtime) {
        return Ok(ArgsExtraction::NoArguments);
    }
    match find_subslice(&creation, &runtime) {
        Some(start) => {
            let tail = &creation[start + runtime.len()..];
            if tail.is_empty() {
                Ok(ArgsExtraction::NoArguments)
            } else {
                Ok(ArgsExtraction::Extracted(format!("0x{}", hex::encode(tail))))
            }
        }
        None => Ok(ArgsExtraction::NotLocated),
    }
}

/// Byte-level comparison of two bytecodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BytecodeComparison {
    Identical { length: usize },
    LengthMismatch { local_length: usize, remote_length: usize },
    Divergent { length: usize, first_offset: usize, differing_bytes: usize, differing_percent: f64 },
}

impl BytecodeComparison {
    pub fn is_identical(&self) -> bool {
        matches!(self, BytecodeComparison::Identical { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            BytecodeComparison::Identical { length } => format!("identical ({length} bytes)"),
            BytecodeComparison::LengthMismatch { local_length, remote_length } => {
                format!("length mismatch: local {local_length} bytes, on-chain {remote_length} bytes")
            }
            BytecodeComparison::Divergent { first_offset, differing_bytes, differing_percent, .. } => {
                format!(
                    "differs at byte offset {first_offset}; {differing_bytes} bytes differ ({differing_percent:.2}%)"
                )
            }
        }
    }
}

pub fn compare_bytecode(local_hex: &str, remote_hex: &str) -> Result<BytecodeComparison, BytecodeError> {
    let local = decode_hex(local_hex, "local bytecode")?;
    let remote = decode_hex(remote_hex, "on-chain bytecode")?;
    if local.len() != remote.len() {
        return Ok(BytecodeComparison::LengthMismatch {
            local_length: local.len(),
            remote_length: remote.len(),
        });
    }
    let mut first_offset = None;
    let mut differing = 0usize;
    for (i, (a, b)) in local.iter().zip(remote.iter()).enumerate() {
        if a != b {
            differing += 1;
            first_offset.get_or_insert(i);
        }
    }
    Ok(match first_offset {
        None => BytecodeComparison::Identical { length: local.len() },
        Some(first_offset) => BytecodeComparison::Divergent {
            length: local.len(),
            first_offset,
            differing_bytes: differing,
            differing_percent: differing as f64 * 100.0 / local.len() as f64,
        },
    })
}

/// Result of checking a local build against what is deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BytecodeValidation {
    pub contract_name: String,
    pub runtime: BytecodeComparison,
    /// Creation code compared with the recovered constructor arguments
    /// removed; absent when the creation code could not be fetched.
    pub creation: Option<BytecodeComparison>,
    pub constructor_args: String,
    pub notes: Vec<String>,
}

impl BytecodeValidation {
    pub fn is_match(&self) -> bool {
        self.runtime.is_identical() && self.creation.as_ref().map_or(true, |c| c.is_identical())
    }
}

pub fn validate_against(
    local: &CompiledBytecode,
    analysis: &BytecodeAnalysisResult,
) -> Result<BytecodeValidation, BytecodeError> {
    let runtime = compare_bytecode(&local.runtime, &analysis.runtime_bytecode)?;
    let mut notes = analysis.errors.clone();

    let creation = if analysis.has_creation_bytecode() && !is_empty_code(&local.creation) {
        let remote = strip_hex_prefix(analysis.creation_bytecode.trim()).to_ascii_lowercase();
        let args = strip_hex_prefix(&analysis.constructor_args).to_ascii_lowercase();
        let trimmed = remote.strip_suffix(args.as_str()).unwrap_or(&remote);
        Some(compare_bytecode(&local.creation, trimmed)?)
    } else {
        notes.push("Creation bytecode comparison skipped".to_string());
        None
    };
    if analysis.extraction == ArgsExtraction::NotLocated {
        notes.push("Could not extract constructor arguments from creation bytecode".to_string());
    }

    Ok(BytecodeValidation {
        contract_name: local.contract_name.clone(),
        runtime,
        creation,
        constructor_args: analysis.constructor_args.clone(),
        notes,
    })
}

pub fn is_empty_code(code: &str) -> bool {
    strip_hex_prefix(code.trim()).is_empty()
}

fn strip_hex_prefix(code: &str) -> &str {
    code.strip_prefix("0x").or_else(|| code.strip_prefix("0X")).unwrap_or(code)
}

fn decode_hex(code: &str, what: &'static str) -> Result<Vec<u8>, BytecodeError> {
    hex::decode(strip_hex_prefix(code.trim())).map_err(|source| BytecodeError::InvalidHex { what, source })
}

fn hex_len(code: &str) -> usize {
    strip_hex_prefix(code).len() / 2
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
