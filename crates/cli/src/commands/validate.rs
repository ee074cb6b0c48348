use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use quorum_core::model::{normalize_address, Chain};
use quorum_core::project::{load_batch_config, CustomerContext, QuorumContext, QuorumSettings};
use quorum_core::services::bytecode::{validate_against, BytecodeAnalyzer};
use quorum_core::services::compiler::{ChainCompiler, ForgeCompiler};
use quorum_core::services::explorer::{EtherscanClient, SourceProvider};
use quorum_core::services::git::{GitCli, GitSync};
use quorum_core::services::governance::governance_for;
use quorum_core::services::pipeline::{ProposalOutcome, ProposalPipeline};

use crate::canonicalize_or_current;
use crate::commands::{customer_providers, load_settings, open_context};

/// Run every check on one deployed payload.
pub fn validate_address_command(
    quorum_path: Option<&str>,
    customer: &str,
    chain: &str,
    payload_address: &str,
    skip_sync: bool,
    with_bytecode: bool,
) -> Result<()> {
    let chain: Chain = chain.parse()?;
    let address = normalize_address(payload_address)?;
    let ctx = open_context(quorum_path)?;
    let customer = ctx.customer(customer)?;
    sync_repos(&ctx, &customer, skip_sync)?;

    let http = ctx.settings.http_client()?;
    let (price_feeds, tokens) = customer_providers(&ctx, &customer, &http)?;
    let explorer = EtherscanClient::new(chain, &ctx.settings, http)?;

    let mut pipeline = ProposalPipeline::new(&ctx.layout, &customer.name, &price_feeds, &tokens);
    if with_bytecode {
        pipeline = pipeline.with_bytecode(&explorer);
    }
    match pipeline.run(chain, &address, &explorer) {
        ProposalOutcome::Completed(_) => Ok(()),
        ProposalOutcome::Aborted { reason } => Err(anyhow!("Checks aborted for {address}: {reason}")),
    }
}

/// Run every proposal listed in a batch file. A failing proposal does not
/// stop the others; the command fails at the end if any was aborted.
pub fn validate_batch_command(quorum_path: Option<&str>, config: &str, skip_sync: bool) -> Result<()> {
    let ctx = open_context(quorum_path)?;
    let config_path = canonicalize_or_current(config)?;
    let batch = load_batch_config(&config_path)?;
    let entries = batch.entries()?;
    let http = ctx.settings.http_client()?;

    let mut synced = BTreeSet::new();
    let mut failed_sync = BTreeSet::new();
    let mut aborted = Vec::new();
    let mut completed = 0usize;

    for entry in entries {
        let label = format!("{}/{}", entry.customer, entry.chain);
        let customer = match ctx.customer(&entry.customer) {
            Ok(customer) => customer,
            Err(err) => {
                abort_entry(&mut aborted, &label, &entry.proposals, &err);
                continue;
            }
        };
        if synced.insert(customer.name.clone()) {
            println!("Run preparation for {}", customer.name);
            if let Err(err) = sync_repos(&ctx, &customer, skip_sync) {
                abort_entry(&mut aborted, &label, &entry.proposals, &err);
                failed_sync.insert(customer.name.clone());
                continue;
            }
        } else if failed_sync.contains(&customer.name) {
            abort_entry(&mut aborted, &label, &entry.proposals, &anyhow!("repository sync failed earlier"));
            continue;
        }
        if entry.proposals.is_empty() {
            continue;
        }

        let prepared = customer_providers(&ctx, &customer, &http).and_then(|providers| {
            let explorer = EtherscanClient::new(entry.chain, &ctx.settings, http.clone())?;
            Ok((providers, explorer))
        });
        let ((price_feeds, tokens), explorer) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                abort_entry(&mut aborted, &label, &entry.proposals, &err);
                continue;
            }
        };
        let pipeline = ProposalPipeline::new(&ctx.layout, &customer.name, &price_feeds, &tokens);

        let mut addresses = Vec::with_capacity(entry.proposals.len());
        for raw in &entry.proposals {
            match normalize_address(raw) {
                Ok(address) => addresses.push(address),
                Err(err) => {
                    warn!(customer = %customer.name, chain = %entry.chain, error = %err, "skipping malformed proposal address");
                    aborted.push(format!("{label}: {err}"))
                }
            }
        }
        for (address, outcome) in pipeline.run_all(entry.chain, &addresses, &explorer) {
            match outcome {
                ProposalOutcome::Completed(_) => completed += 1,
                ProposalOutcome::Aborted { reason } => aborted.push(format!("{label}/{address}: {reason}")),
            }
        }
    }

    info!(completed, aborted = aborted.len(), "batch finished");
    print_summary("Batch", completed, &aborted)
}

/// Fetch a governance proposal's payloads and check each on its chain.
pub fn validate_proposal_id_command(
    quorum_path: Option<&str>,
    customer: &str,
    proposal_id: u64,
    skip_sync: bool,
) -> Result<()> {
    let ctx = open_context(quorum_path)?;
    let http = ctx.settings.http_client()?;
    let governance = governance_for(customer, http.clone())?;
    let customer = ctx.customer(customer)?;

    let payloads = governance
        .proposal_payloads(proposal_id)
        .with_context(|| format!("Failed to fetch proposal {proposal_id} from {}", governance.name()))?;
    println!("Proposal {proposal_id} of {} has {} payload(s):", customer.name, payloads.len());
    for payload in &payloads {
        println!("- {}: {}", payload.chain, payload.addresses.join(", "));
    }

    sync_repos(&ctx, &customer, skip_sync)?;
    let (price_feeds, tokens) = customer_providers(&ctx, &customer, &http)?;
    let pipeline = ProposalPipeline::new(&ctx.layout, &customer.name, &price_feeds, &tokens);
    let outcomes = pipeline.run_payloads(&payloads, |chain| {
        EtherscanClient::new(chain, &ctx.settings, http.clone()).map(|c| Box::new(c) as Box<dyn SourceProvider>)
    });

    let mut completed = 0usize;
    let mut aborted = Vec::new();
    for (chain, address, outcome) in outcomes {
        match outcome {
            ProposalOutcome::Completed(_) => completed += 1,
            ProposalOutcome::Aborted { reason } => aborted.push(format!("{chain}/{address}: {reason}")),
        }
    }
    print_summary(&format!("Proposal {proposal_id}"), completed, &aborted)
}

fn print_summary(title: &str, completed: usize, aborted: &[String]) -> Result<()> {
    println!("{title} summary:");
    println!("- completed: {completed}");
    println!("- aborted: {}", aborted.len());
    for reason in aborted {
        println!("  - {reason}");
    }
    if aborted.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} proposal(s) could not be checked", aborted.len()))
    }
}

/// A proposal inside a forge project, and how to build it.
#[derive(Debug, Clone, Copy)]
pub struct ForgeTarget<'a> {
    pub forge_root_path: &'a str,
    /// Proposal file, relative to the forge root.
    pub contract_proposal_path: &'a str,
    /// Build with `FOUNDRY_PROFILE=default`.
    pub default_profile: bool,
}

impl ForgeTarget<'_> {
    fn compiler(&self) -> ForgeCompiler {
        ForgeCompiler::default().with_default_profile(self.default_profile)
    }
}

/// Compile a proposal locally with forge and run every check on its sources.
pub fn validate_local_payload_command(
    quorum_path: Option<&str>,
    customer: &str,
    chain: &str,
    target: ForgeTarget<'_>,
    skip_sync: bool,
) -> Result<()> {
    let chain: Chain = chain.parse()?;
    let ctx = open_context(quorum_path)?;
    let customer = ctx.customer(customer)?;
    sync_repos(&ctx, &customer, skip_sync)?;

    let contract_proposal_path = target.contract_proposal_path;
    let forge_root = canonicalize_or_current(target.forge_root_path)?;
    let units = target
        .compiler()
        .compile(&forge_root, Path::new(contract_proposal_path))
        .with_context(|| format!("Failed to compile {contract_proposal_path}"))?;
    if units.is_empty() {
        return Err(anyhow!("Build of {contract_proposal_path} produced no readable sources"));
    }

    let http = ctx.settings.http_client()?;
    let (price_feeds, tokens) = customer_providers(&ctx, &customer, &http)?;
    let pipeline = ProposalPipeline::new(&ctx.layout, &customer.name, &price_feeds, &tokens);
    match pipeline.run_with_sources(chain, contract_proposal_path, &units) {
        ProposalOutcome::Completed(_) => Ok(()),
        ProposalOutcome::Aborted { reason } => {
            Err(anyhow!("Checks aborted for {contract_proposal_path}: {reason}"))
        }
    }
}

/// Compare a local forge build of a proposal with what is deployed.
pub fn validate_bytecode_command(
    quorum_path: Option<&str>,
    chain: &str,
    payload_address: &str,
    target: ForgeTarget<'_>,
    contract_name: Option<&str>,
    json: bool,
) -> Result<()> {
    let chain: Chain = chain.parse()?;
    let address = normalize_address(payload_address)?;
    // Only the API keys matter here; no working directory is needed.
    let settings = match quorum_path {
        Some(_) => load_settings(quorum_path)?,
        None => QuorumSettings::with_main_path(std::env::current_dir().context("Failed to get current directory")?),
    };

    let contract_proposal_path = target.contract_proposal_path;
    let proposal_file = Path::new(contract_proposal_path);
    let contract_name = match contract_name {
        Some(name) => name.to_string(),
        None => proposal_file
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cannot infer contract name from {contract_proposal_path}; pass --contract-name"))?,
    };

    let forge_root = canonicalize_or_current(target.forge_root_path)?;
    let local = target
        .compiler()
        .build_bytecode(&forge_root, proposal_file, &contract_name)
        .with_context(|| format!("Failed to build {contract_name}"))?;

    let explorer = EtherscanClient::new(chain, &settings, settings.http_client()?)?;
    let analysis = BytecodeAnalyzer::new(&explorer)
        .analyze(&address)
        .with_context(|| format!("Failed to analyze deployed bytecode at {address}"))?;
    let validation = validate_against(&local, &analysis)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
        return Ok(());
    }

    println!("Bytecode validation for {contract_name} at {address} on {chain}:");
    println!("- runtime: {}", validation.runtime.describe());
    match &validation.creation {
        Some(creation) => println!("- creation: {}", creation.describe()),
        None => println!("- creation: skipped"),
    }
    if !validation.constructor_args.is_empty() {
        println!("- constructor args: {}", validation.constructor_args);
    }
    for note in &validation.notes {
        println!("- note: {note}");
    }
    println!("Result: {}", if validation.is_match() { "MATCH" } else { "MISMATCH" });
    Ok(())
}

/// Record every proposal of a batch entry that could not be prepared.
fn abort_entry(aborted: &mut Vec<String>, label: &str, proposals: &[String], err: &anyhow::Error) {
    warn!(entry = label, error = %err, "batch entry aborted");
    println!("Skipping {label}: {err:#}");
    if proposals.is_empty() {
        aborted.push(format!("{label}: {err:#}"));
    }
    for proposal in proposals {
        aborted.push(format!("{label}/{proposal}: {err:#}"));
    }
}

fn sync_repos(ctx: &QuorumContext, customer: &CustomerContext, skip_sync: bool) -> Result<()> {
    if skip_sync {
        println!("Skipping repository sync for {}", customer.name);
        return Ok(());
    }
    info!(customer = %customer.name, "syncing repositories");
    GitCli::default()
        .clone_or_update(&ctx.layout, customer)
        .with_context(|| format!("Failed to sync repositories for {}", customer.name))
}
