use anyhow::{Context, Result};

use quorum_core::model::Chain;
use quorum_core::services::checks::list_runs;

use crate::commands::open_context;

/// List check runs recorded on disk for a customer.
pub fn list_runs_command(
    quorum_path: Option<&str>,
    customer: &str,
    chain: Option<&str>,
    proposal: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = open_context(quorum_path)?;
    let chain = chain.map(str::parse::<Chain>).transpose()?;
    let runs = list_runs(&ctx.layout, customer, chain, proposal)
        .with_context(|| format!("Failed to list check runs for {customer}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("Check runs for {customer}: (none)");
        return Ok(());
    }

    println!("Check runs for {customer}:");
    for run in runs {
        println!(
            "- {}/{}/{}: {} ({} artifacts)",
            run.chain, run.proposal, run.directory, run.check_name, run.artifacts
        );
    }
    Ok(())
}
