use std::cell::RefCell;

use quorum_core::model::{Chain, SourceUnit};
use quorum_core::project::{QuorumLayout, QuorumSettings};
use quorum_core::services::explorer::{ExplorerError, SourceProvider};
use quorum_core::services::governance::{
    chain_for_id, governance_for, parse_payload_targets, parse_proposal_payloads, GovernanceError,
    GovernanceProvider, PayloadAddresses, PayloadRef,
};
use quorum_core::services::pipeline::{ProposalOutcome, ProposalPipeline};
use tempfile::tempdir;

const MAINNET_PAYLOAD: &str = "0x1111111111111111111111111111111111111111";
const ARBITRUM_PAYLOAD: &str = "0x4444444444444444444444444444444444444444";

/// Governance stand-in returning fixed payloads for proposal 42.
struct FakeGovernance {
    payloads: Vec<PayloadAddresses>,
}

impl GovernanceProvider for FakeGovernance {
    fn name(&self) -> &'static str {
        "fake governance"
    }

    fn proposal_payloads(&self, proposal_id: u64) -> Result<Vec<PayloadAddresses>, GovernanceError> {
        if proposal_id == 42 {
            Ok(self.payloads.clone())
        } else {
            Err(GovernanceError::ProposalNotFound { proposal_id, url: "memory://".to_string() })
        }
    }
}

struct FakeExplorer;

impl SourceProvider for FakeExplorer {
    fn source_code(&self, address: &str) -> Result<Vec<SourceUnit>, ExplorerError> {
        Ok(vec![SourceUnit::from_text(
            format!("src/Payload_{}.sol", &address[2..6]),
            "contract Payload {\n    function execute() external {}\n}",
        )])
    }
}

fn fake_governance() -> FakeGovernance {
    FakeGovernance {
        payloads: vec![
            PayloadAddresses {
                chain: Chain::Ethereum,
                addresses: vec![MAINNET_PAYLOAD.to_string(), "0xnot-an-address".to_string()],
            },
            PayloadAddresses { chain: Chain::Arbitrum, addresses: vec![ARBITRUM_PAYLOAD.to_string()] },
        ],
    }
}

#[test]
fn proposal_payloads_run_on_their_own_chains() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let governance = fake_governance();
    let payloads = governance.proposal_payloads(42).expect("payloads");

    let asked = RefCell::new(Vec::new());
    let pipeline = ProposalPipeline::new(&layout, "Aave", &[], &[]);
    let outcomes = pipeline.run_payloads(&payloads, |chain| {
        asked.borrow_mut().push(chain);
        Ok(Box::new(FakeExplorer) as Box<dyn SourceProvider>)
    });

    assert_eq!(*asked.borrow(), vec![Chain::Ethereum, Chain::Arbitrum]);
    assert_eq!(outcomes.len(), 3);
    assert_eq!((outcomes[0].0, outcomes[0].1.as_str()), (Chain::Ethereum, MAINNET_PAYLOAD));
    assert!(outcomes[0].2.is_completed());
    assert!(matches!(&outcomes[1].2, ProposalOutcome::Aborted { reason } if reason.contains("0xnot-an-address")));
    assert_eq!(outcomes[2].0, Chain::Arbitrum);
    assert!(outcomes[2].2.is_completed());

    assert!(layout.proposal_checks_dir("Aave", "Ethereum", MAINNET_PAYLOAD).is_dir());
    assert!(layout.proposal_checks_dir("Aave", "Arbitrum", ARBITRUM_PAYLOAD).is_dir());
}

#[test]
fn missing_explorer_aborts_only_that_chain() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let payloads = fake_governance().proposal_payloads(42).expect("payloads");

    let pipeline = ProposalPipeline::new(&layout, "Aave", &[], &[]);
    let outcomes = pipeline.run_payloads(&payloads, |chain| match chain {
        Chain::Ethereum => Err(ExplorerError::MissingApiKey("ETHSCAN_API_KEY")),
        _ => Ok(Box::new(FakeExplorer) as Box<dyn SourceProvider>),
    });

    assert_eq!(outcomes.len(), 3);
    for (_, _, outcome) in &outcomes[..2] {
        assert!(matches!(outcome, ProposalOutcome::Aborted { reason } if reason.contains("ETHSCAN_API_KEY")));
    }
    assert!(outcomes[2].2.is_completed());
}

#[test]
fn unknown_proposal_is_reported() {
    let err = fake_governance().proposal_payloads(7).expect_err("unknown proposal");
    assert!(matches!(err, GovernanceError::ProposalNotFound { proposal_id: 7, .. }));
    assert!(err.to_string().contains("not updated"));
}

#[test]
fn cache_documents_are_parsed() {
    let proposal = r#"{
        "ipfs": {"title": "Add asset"},
        "proposal": {
            "payloads": [
                {"chain": "1", "payloadsController": "0xdAbad81aF85554E9ae636395611C58F7eC1aAEc5", "payloadId": 211, "accessLevel": 1},
                {"chain": "42161", "payloadsController": "0x89644CA1bB8064760312AE4F03ea41b05dA3637C", "payloadId": 38}
            ],
            "votingPortal": "0x9b24C168d6A76b5459B1d47071a54962a4df36c3"
        },
        "events": []
    }"#;
    let payloads = parse_proposal_payloads(proposal).expect("proposal");
    assert_eq!(
        payloads[1],
        PayloadRef {
            chain: "42161".to_string(),
            payloads_controller: "0x89644CA1bB8064760312AE4F03ea41b05dA3637C".to_string(),
            payload_id: 38,
        }
    );
    assert!(parse_proposal_payloads(r#"{"ipfs": null}"#).expect("empty").is_empty());

    let payload = r#"{"payload": {"actions": [
        {"target": "0xAAaaAaaaaAaaAAaAaaAaaAaaaAaAAaaAaAaaAaaA", "withDelegateCall": true},
        {"target": "0xbbbBbbbBbBbbbbBBbbbbBbbBbBBBbbbBBBbbbBBB"}
    ]}}"#;
    assert_eq!(
        parse_payload_targets(payload).expect("targets"),
        vec!["0xAAaaAaaaaAaaAAaAaaAaaAaaaAaAAaaAaAaaAaaA", "0xbbbBbbbBbBbbbbBBbbbbBbbBbBBBbbbBBBbbbBBB"]
    );
    assert!(matches!(parse_payload_targets("{}"), Err(GovernanceError::Decode(_))));
}

#[test]
fn chain_ids_map_to_supported_chains() {
    assert_eq!(chain_for_id("1").expect("mainnet"), Chain::Ethereum);
    assert_eq!(chain_for_id("1088").expect("metis"), Chain::Metis);
    assert_eq!(chain_for_id("146").expect("sonic"), Chain::Sonic);
    assert!(matches!(chain_for_id("5"), Err(GovernanceError::UnsupportedChainId(id)) if id == "5"));
    assert!(chain_for_id("mainnet").is_err());
}

#[test]
fn only_known_customers_have_governance() {
    let tmp = tempdir().expect("tempdir");
    let http = QuorumSettings::with_main_path(tmp.path()).http_client().expect("http");

    let aave = governance_for("AAVE", http.clone()).expect("aave");
    assert_eq!(aave.name(), "Aave governance cache");

    let err = governance_for("Compound", http).err().expect("unsupported");
    assert!(err.to_string().contains("Supported customers: aave"));
}
