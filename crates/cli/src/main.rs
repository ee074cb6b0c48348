use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quorum::commands::{
    cache_info_command, clear_cache_command, list_providers_command, list_runs_command, setup_command,
    validate_address_command, validate_batch_command, validate_bytecode_command,
    validate_local_payload_command, validate_proposal_id_command, ForgeTarget,
};

/// Governance proposal verification CLI.
///
/// This CLI is a thin wrapper around `quorum-core` (exposed in code as `quorum_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "quorum",
    version,
    about = "Verify governance proposal payloads before a vote",
    long_about = None
)]
struct Cli {
    /// Quorum working directory (ground truth, clones, check artifacts, cache).
    #[arg(long, global = true, env = "QUORUM_PATH")]
    quorum_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a working directory with template configuration files.
    ///
    /// Writes `.env`, `execution.json`, `ground_truth.json` and `README.md`,
    /// skipping any that already exist.
    Setup {
        #[arg(long, default_value = ".")]
        working_dir: String,
    },

    /// Run every check on one deployed payload.
    ValidateAddress {
        #[arg(long)]
        customer: String,

        /// Chain name or code (e.g. Ethereum, ETH, Arbitrum).
        #[arg(long)]
        chain: String,

        #[arg(long)]
        payload_address: String,

        /// Do not clone or pull the customer's repositories first.
        #[arg(long, default_value_t = false)]
        skip_sync: bool,

        /// Also analyze the deployed bytecode and constructor arguments.
        #[arg(long, default_value_t = false)]
        with_bytecode: bool,
    },

    /// Run every proposal listed in a batch execution file (JSON or YAML).
    ValidateBatch {
        #[arg(long)]
        config: String,

        #[arg(long, default_value_t = false)]
        skip_sync: bool,
    },

    /// Fetch a governance proposal by id and check every payload it executes.
    ValidateProposalId {
        #[arg(long)]
        customer: String,

        #[arg(long)]
        proposal_id: u64,

        #[arg(long, default_value_t = false)]
        skip_sync: bool,
    },

    /// Compile a proposal locally with forge and run every check on its sources.
    ValidateLocalPayload {
        #[arg(long)]
        customer: String,

        #[arg(long)]
        chain: String,

        /// Root of the forge project containing the proposal.
        #[arg(long)]
        forge_root_path: String,

        /// Proposal file, relative to the forge root.
        #[arg(long)]
        contract_proposal_path: String,

        /// Build with FOUNDRY_PROFILE=default instead of the project's profile.
        #[arg(long, default_value_t = false)]
        default_profile: bool,

        #[arg(long, default_value_t = false)]
        skip_sync: bool,
    },

    /// Compare a local forge build with the bytecode deployed at an address.
    ValidateBytecode {
        #[arg(long)]
        chain: String,

        #[arg(long)]
        payload_address: String,

        #[arg(long)]
        forge_root_path: String,

        #[arg(long)]
        contract_proposal_path: String,

        /// Contract to compare. Defaults to the proposal file's stem.
        #[arg(long)]
        contract_name: Option<String>,

        /// Build with FOUNDRY_PROFILE=default instead of the project's profile.
        #[arg(long, default_value_t = false)]
        default_profile: bool,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the address providers known to this binary.
    ListProviders {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List check runs recorded on disk for a customer.
    ListRuns {
        #[arg(long)]
        customer: String,

        #[arg(long)]
        chain: Option<String>,

        #[arg(long)]
        proposal: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show address cache location and entry counts per provider.
    CacheInfo {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Delete cached address resolutions (all, or one provider's).
    ClearCache {
        #[arg(long)]
        provider: Option<String>,

        /// Confirm deletion.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let quorum_path = cli.quorum_path.as_deref();

    match cli.command {
        Command::Setup { working_dir } => setup_command(&working_dir)?,
        Command::ValidateAddress { customer, chain, payload_address, skip_sync, with_bytecode } => {
            validate_address_command(
                quorum_path,
                &customer,
                &chain,
                &payload_address,
                skip_sync,
                with_bytecode,
            )?
        }
        Command::ValidateBatch { config, skip_sync } => {
            validate_batch_command(quorum_path, &config, skip_sync)?
        }
        Command::ValidateProposalId { customer, proposal_id, skip_sync } => {
            validate_proposal_id_command(quorum_path, &customer, proposal_id, skip_sync)?
        }
        Command::ValidateLocalPayload {
            customer,
            chain,
            forge_root_path,
            contract_proposal_path,
            default_profile,
            skip_sync,
        } => validate_local_payload_command(
            quorum_path,
            &customer,
            &chain,
            ForgeTarget {
                forge_root_path: &forge_root_path,
                contract_proposal_path: &contract_proposal_path,
                default_profile,
            },
            skip_sync,
        )?,
        Command::ValidateBytecode {
            chain,
            payload_address,
            forge_root_path,
            contract_proposal_path,
            contract_name,
            default_profile,
            json,
        } => validate_bytecode_command(
            quorum_path,
            &chain,
            &payload_address,
            ForgeTarget {
                forge_root_path: &forge_root_path,
                contract_proposal_path: &contract_proposal_path,
                default_profile,
            },
            contract_name.as_deref(),
            json,
        )?,
        Command::ListProviders { json } => list_providers_command(json)?,
        Command::ListRuns { customer, chain, proposal, json } => list_runs_command(
            quorum_path,
            &customer,
            chain.as_deref(),
            proposal.as_deref(),
            json,
        )?,
        Command::CacheInfo { json } => cache_info_command(quorum_path, json)?,
        Command::ClearCache { provider, yes } => {
            clear_cache_command(quorum_path, provider.as_deref(), yes)?
        }
    }

    Ok(())
}
