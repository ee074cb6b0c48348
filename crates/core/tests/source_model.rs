use quorum_core::model::{
    is_valid_address, normalize_address, parse_source, source_digest, strip_comments, AddressRecord, Chain,
    ParseOutcome, SourceUnit,
};

const PAYLOAD: &str = r#"
// SPDX-License-Identifier: MIT
pragma solidity ^0.8.0;

import {IPool} from "./IPool.sol";

/// @notice address in a doc comment: 0x1111111111111111111111111111111111111111
contract Payload {
    using SafeCast for uint256;

    struct Config { uint256 cap; address asset; }
    event Executed(address indexed by);

    uint256 public constant MAX = 10;
    address public immutable POOL;
    mapping(address => uint256) public balances;
    bool internal executed = false;
    string public label = "a;b{c}";

    constructor(address pool) {
        POOL = pool;
    }

    function execute() external {
        uint256 local = MAX;
        executed = local == MAX;
    }

    function newListings() public view returns (uint256) {
        return 1;
    }
}
"#;

#[test]
fn scanner_collects_state_variables_with_flags() {
    let unit = SourceUnit::from_text("src/Payload.sol", PAYLOAD);
    let vars = unit.state_variables();

    let names: Vec<&str> = vars.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["MAX", "POOL", "balances", "executed", "label"]);

    assert!(vars["MAX"].is_constant);
    assert!(!vars["MAX"].is_immutable);
    assert!(vars["POOL"].is_immutable);
    assert_eq!(vars["balances"].declared_type, "mapping(address => uint256)");
    assert!(vars["executed"].is_mutable_storage());
    assert_eq!(vars["executed"].contract.as_deref(), Some("Payload"));
}

#[test]
fn scanner_ignores_locals_events_and_structs() {
    let unit = SourceUnit::from_text("Payload.sol", PAYLOAD);
    let vars = unit.state_variables();
    assert!(!vars.contains_key("local"));
    assert!(!vars.contains_key("cap"));
    assert!(!vars.contains_key("Executed"));
}

#[test]
fn scanner_collects_functions_with_visibility() {
    let unit = SourceUnit::from_text("Payload.sol", PAYLOAD);
    let functions = unit.functions();
    assert_eq!(functions["execute"].visibility.as_deref(), Some("external"));
    assert_eq!(functions["newListings"].visibility.as_deref(), Some("public"));
    assert_eq!(functions["newListings"].contract.as_deref(), Some("Payload"));
}

#[test]
fn function_typed_state_variables_are_storage() {
    let source = r#"
contract Hooks {
    function(uint256) external returns (uint256) internal hook;
    function(address) internal pure validator = _check;
    function(uint256) internal constant FIXED = _double;
    function(uint256) external callback;

    function _check(address who) internal pure {}
    function _double(uint256 x) internal pure returns (uint256) { return x * 2; }
    function setHook() external;
}
"#;
    let unit = SourceUnit::from_text("Hooks.sol", source);
    let vars = unit.state_variables();

    let names: Vec<&str> = vars.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["FIXED", "callback", "hook", "validator"]);
    assert_eq!(vars["hook"].declared_type, "function(uint256) external returns(uint256)");
    assert_eq!(vars["validator"].declared_type, "function(address) internal pure");
    assert!(vars["hook"].is_mutable_storage());
    assert!(vars["validator"].is_mutable_storage());
    assert!(vars["FIXED"].is_constant);

    let functions = unit.functions();
    assert!(functions.contains_key("_check"));
    assert!(functions.contains_key("setHook"));
    assert!(!functions.contains_key("hook"));
}

#[test]
fn unbalanced_source_degrades_to_empty_facts() {
    let unit = SourceUnit::from_text("Broken.sol", "contract Broken { uint256 x;");
    let outcome = unit.parse_outcome();
    assert!(outcome.failure_reason().is_some());
    assert!(unit.state_variables().is_empty());
    assert!(unit.functions().is_empty());
}

#[test]
fn unterminated_comment_is_a_parse_failure() {
    match parse_source("contract A { /* never closed ") {
        ParseOutcome::Failed { reason } => assert!(!reason.is_empty()),
        ParseOutcome::Parsed(_) => panic!("expected failure"),
    }
}

#[test]
fn parsing_is_idempotent() {
    let unit = SourceUnit::from_text("Payload.sol", PAYLOAD);
    let first = unit.parse_outcome().clone();
    assert_eq!(&first, unit.parse_outcome());
    assert_eq!(first, parse_source(&unit.text()));
}

#[test]
fn strip_comments_keeps_code_and_strings() {
    let text = "uint a = 1; // 0xdead\n/* block\n comment */ string s = \"// not a comment\";";
    let stripped = strip_comments(text);
    assert!(!stripped.contains("0xdead"));
    assert!(!stripped.contains("block"));
    assert!(stripped.contains("\"// not a comment\""));
    assert_eq!(stripped.lines().count(), text.lines().count());
}

#[test]
fn source_unit_names_and_digest() {
    let unit = SourceUnit::from_text("contracts/v2/Foo.sol", "a\nb");
    assert_eq!(unit.file_name(), "Foo.sol");
    assert_eq!(unit.stem(), "Foo");
    assert_eq!(unit.lines().len(), 2);

    let same = SourceUnit::from_text("contracts/v2/Foo.sol", "a\nb");
    let other = SourceUnit::from_text("contracts/v2/Foo.sol", "a\nc");
    assert_eq!(unit.content_hash(), same.content_hash());
    assert_ne!(source_digest(&[unit.clone()]), source_digest(&[other]));
    assert_eq!(source_digest(&[unit]), source_digest(&[same]));
}

#[test]
fn address_validation_and_normalization() {
    let mixed = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";
    assert!(is_valid_address(mixed));
    assert!(!is_valid_address("0x1234"));
    assert!(!is_valid_address("AbCdEf0123456789aBcDeF0123456789AbCdEf0123"));
    assert_eq!(normalize_address(mixed).expect("valid"), mixed.to_ascii_lowercase());
    assert!(normalize_address("0xZZ").is_err());
}

#[test]
fn proxy_hit_is_relative_to_primary_address() {
    let mut record = AddressRecord::new("0xaaaa000000000000000000000000000000000000");
    record.alternate_address = Some("0xbbbb000000000000000000000000000000000000".to_string());
    assert!(!record.is_proxy_hit("0xAAAA000000000000000000000000000000000000"));
    assert!(record.is_proxy_hit("0xbbbb000000000000000000000000000000000000"));
}

#[test]
fn chain_parsing_accepts_names_and_codes() {
    assert_eq!("ethereum".parse::<Chain>().expect("name"), Chain::Ethereum);
    assert_eq!("ARB".parse::<Chain>().expect("code"), Chain::Arbitrum);
    assert_eq!("zk".parse::<Chain>().expect("code"), Chain::Zksync);
    assert_eq!(Chain::Metis.chain_id(), 1088);
    assert_eq!(Chain::Bnb.to_string(), "BNB");

    let err = "Solana".parse::<Chain>().unwrap_err();
    assert!(err.to_string().contains("Solana"));
}

#[test]
fn chain_serializes_as_display_name() {
    let json = serde_json::to_string(&Chain::Optimism).expect("serialize");
    assert_eq!(json, "\"Optimism\"");
    let back: Chain = serde_json::from_str("\"OPT\"").expect("deserialize");
    assert_eq!(back, Chain::Optimism);
}

#[test]
fn library_version_matches_manifest() {
    assert_eq!(quorum_core::version(), env!("CARGO_PKG_VERSION"));
}
