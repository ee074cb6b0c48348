use anyhow::Result;
use serde::Serialize;

use quorum_core::services::providers::ProviderKind;

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub family: String,
    pub description: String,
}

/// List the address providers this binary can consult.
pub fn list_providers_command(json: bool) -> Result<()> {
    let entries: Vec<ProviderInfo> = ProviderKind::ALL
        .into_iter()
        .map(|kind| ProviderInfo {
            name: kind.name().to_string(),
            family: if kind.is_price_feed() { "price feed" } else { "token" }.to_string(),
            description: kind.description().to_string(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Providers:");
    for entry in entries {
        println!("- {} ({}): {}", entry.name, entry.family, entry.description);
    }
    Ok(())
}
