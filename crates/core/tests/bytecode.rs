use std::collections::HashMap;

use quorum_core::services::bytecode::{
    compare_bytecode, extract_constructor_args, validate_against, ArgsExtraction, BytecodeAnalyzer,
    BytecodeComparison, BytecodeError, ChainRpc, RpcError,
};
use quorum_core::services::compiler::CompiledBytecode;

const ADDRESS: &str = "0x1111111111111111111111111111111111111111";
const INIT: &str = "6080604052";
const RUNTIME: &str = "6080604052348015600f57600080fd5b50";
const ARGS: &str = "000000000000000000000000000000000000000000000000000000000000002a";

/// Canned chain answers keyed by address / transaction hash.
#[derive(Default)]
struct FakeRpc {
    code: HashMap<String, String>,
    creators: HashMap<String, String>,
    inputs: HashMap<String, String>,
}

impl FakeRpc {
    fn deployed(runtime: &str, creation: &str) -> Self {
        let mut rpc = FakeRpc::default();
        rpc.code.insert(ADDRESS.to_string(), runtime.to_string());
        rpc.creators.insert(ADDRESS.to_string(), "0xfeed".to_string());
        rpc.inputs.insert("0xfeed".to_string(), creation.to_string());
        rpc
    }
}

impl ChainRpc for FakeRpc {
    fn runtime_code(&self, address: &str) -> Result<String, RpcError> {
        Ok(self.code.get(address).cloned().unwrap_or_else(|| "0x".to_string()))
    }

    fn creation_tx_hash(&self, address: &str) -> Result<String, RpcError> {
        self.creators.get(address).cloned().ok_or_else(|| RpcError("no creation record".to_string()))
    }

    fn transaction_input(&self, tx_hash: &str) -> Result<String, RpcError> {
        self.inputs.get(tx_hash).cloned().ok_or_else(|| RpcError("unknown transaction".to_string()))
    }
}

#[test]
fn arguments_after_runtime_code_are_extracted() {
    let creation = format!("0x{INIT}{RUNTIME}{ARGS}");
    let extraction = extract_constructor_args(&creation, &format!("0x{RUNTIME}")).expect("extract");
    assert_eq!(extraction, ArgsExtraction::Extracted(format!("0x{ARGS}")));
    assert_eq!(extraction.args_hex(), format!("0x{ARGS}"));
}

#[test]
fn creation_equal_to_runtime_has_no_arguments() {
    let code = format!("0x{RUNTIME}");
    assert_eq!(extract_constructor_args(&code, &code).expect("extract"), ArgsExtraction::NoArguments);
    let creation = format!("0x{INIT}{RUNTIME}");
    assert_eq!(extract_constructor_args(&creation, &code).expect("extract"), ArgsExtraction::NoArguments);
}

#[test]
fn missing_runtime_inside_creation_is_not_located() {
    let extraction = extract_constructor_args(&format!("0x{INIT}{ARGS}"), "0xdeadbeef").expect("extract");
    assert_eq!(extraction, ArgsExtraction::NotLocated);
    assert_eq!(extraction.args_hex(), "");
    assert_eq!(extract_constructor_args("0x", RUNTIME).expect("extract"), ArgsExtraction::NotAttempted);
}

#[test]
fn invalid_hex_is_an_error() {
    let err = extract_constructor_args("0xzz", RUNTIME).expect_err("invalid hex");
    assert!(matches!(err, BytecodeError::InvalidHex { .. }));
}

#[test]
fn comparison_reports_first_difference() {
    assert_eq!(compare_bytecode("0xaabb", "AABB").expect("compare"), BytecodeComparison::Identical { length: 2 });
    assert_eq!(
        compare_bytecode("0xaabb", "0xaa").expect("compare"),
        BytecodeComparison::LengthMismatch { local_length: 2, remote_length: 1 }
    );
    match compare_bytecode("0xaabbccdd", "0xaabbcc00").expect("compare") {
        BytecodeComparison::Divergent { first_offset, differing_bytes, differing_percent, .. } => {
            assert_eq!(first_offset, 3);
            assert_eq!(differing_bytes, 1);
            assert!((differing_percent - 25.0).abs() < 1e-9);
        }
        other => panic!("unexpected comparison {other:?}"),
    }
}

#[test]
fn analyzer_recovers_constructor_arguments() {
    let rpc = FakeRpc::deployed(&format!("0x{RUNTIME}"), &format!("0x{INIT}{RUNTIME}{ARGS}"));
    let analysis = BytecodeAnalyzer::new(&rpc).analyze(ADDRESS).expect("analysis");

    assert!(analysis.has_creation_bytecode());
    assert!(analysis.has_constructor_args());
    assert_eq!(analysis.constructor_args, format!("0x{ARGS}"));
    assert!(analysis.errors.is_empty());
    assert!(analysis.summary().contains("Constructor args: 32 bytes"));
}

#[test]
fn analyzer_requires_runtime_code() {
    let rpc = FakeRpc::default();
    let err = BytecodeAnalyzer::new(&rpc).analyze(ADDRESS).expect_err("no code");
    assert!(matches!(err, BytecodeError::NoRuntimeBytecode { .. }));
}

#[test]
fn creation_lookup_failure_is_recorded_not_fatal() {
    let mut rpc = FakeRpc::default();
    rpc.code.insert(ADDRESS.to_string(), format!("0x{RUNTIME}"));
    let analysis = BytecodeAnalyzer::new(&rpc).analyze(ADDRESS).expect("analysis");

    assert!(!analysis.has_creation_bytecode());
    assert_eq!(analysis.extraction, ArgsExtraction::NotAttempted);
    assert_eq!(analysis.errors.len(), 1);
    assert!(analysis.errors[0].contains("no creation record"));
}

#[test]
fn local_build_matches_deployment() {
    let rpc = FakeRpc::deployed(&format!("0x{RUNTIME}"), &format!("0x{INIT}{RUNTIME}{ARGS}"));
    let analysis = BytecodeAnalyzer::new(&rpc).analyze(ADDRESS).expect("analysis");
    let local = CompiledBytecode {
        contract_name: "Payload".to_string(),
        creation: format!("0x{INIT}{RUNTIME}"),
        runtime: format!("0x{RUNTIME}"),
    };

    let validation = validate_against(&local, &analysis).expect("validate");
    assert!(validation.is_match());
    assert!(validation.runtime.is_identical());
    assert_eq!(validation.constructor_args, format!("0x{ARGS}"));
}

#[test]
fn modified_runtime_is_a_mismatch() {
    let rpc = FakeRpc::deployed(&format!("0x{RUNTIME}"), &format!("0x{INIT}{RUNTIME}"));
    let analysis = BytecodeAnalyzer::new(&rpc).analyze(ADDRESS).expect("analysis");
    let tampered = RUNTIME.replacen("6080", "6081", 1);
    let local = CompiledBytecode {
        contract_name: "Payload".to_string(),
        creation: String::new(),
        runtime: format!("0x{tampered}"),
    };

    let validation = validate_against(&local, &analysis).expect("validate");
    assert!(!validation.is_match());
    assert!(validation.creation.is_none());
    assert!(validation.notes.iter().any(|n| n.contains("skipped")));
}
