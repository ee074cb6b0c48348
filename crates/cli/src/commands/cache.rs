use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use quorum_core::cache::ProviderCount;
use quorum_core::services::providers::ProviderKind;

use crate::commands::{open_context, print_dir_status};

#[derive(Debug, Serialize)]
struct CacheInfo {
    path: String,
    total: u64,
    providers: Vec<ProviderCount>,
}

/// Show where the address cache lives and how many entries each provider has.
pub fn cache_info_command(quorum_path: Option<&str>, json: bool) -> Result<()> {
    let ctx = open_context(quorum_path)?;
    let providers = ctx.cache.counts().context("Failed to read address cache")?;
    let info = CacheInfo {
        path: ctx.layout.cache_db_path.display().to_string(),
        total: providers.iter().map(|p| p.entries).sum(),
        providers,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Address cache: {}", info.path);
    print_dir_status("Meta dir (.quorum)", &ctx.layout.meta_dir);
    println!("Entries: {}", info.total);
    for count in &info.providers {
        println!("- {}: {}", count.provider, count.entries);
    }
    Ok(())
}

/// Remove cached resolutions. Entries never expire on their own, so this is
/// how stale registry data gets refreshed.
pub fn clear_cache_command(quorum_path: Option<&str>, provider: Option<&str>, yes: bool) -> Result<()> {
    if !yes {
        return Err(anyhow!("Refusing to clear the address cache without --yes"));
    }
    let provider = provider
        .map(|name| name.parse::<ProviderKind>().map(ProviderKind::name))
        .transpose()?;
    let ctx = open_context(quorum_path)?;
    let removed = ctx.cache.clear(provider).context("Failed to clear address cache")?;
    match provider {
        Some(name) => println!("Removed {removed} cached entries for {name}"),
        None => println!("Removed {removed} cached entries"),
    }
    Ok(())
}
