use anyhow::{Context, Result};

use quorum_core::project::{CustomerContext, HttpClient, QuorumContext, QuorumSettings};
use quorum_core::services::providers::{build_providers, AddressProvider};

use crate::canonicalize_or_current;

/// Resolve settings from `--quorum-path` (clap also fills it from
/// `QUORUM_PATH`), failing with the environment variable's name otherwise.
pub fn load_settings(quorum_path: Option<&str>) -> Result<QuorumSettings> {
    match quorum_path {
        Some(path) => Ok(QuorumSettings::with_main_path(canonicalize_or_current(path)?)),
        None => QuorumSettings::from_env(),
    }
}

/// Settings plus the opened address cache.
pub fn open_context(quorum_path: Option<&str>) -> Result<QuorumContext> {
    QuorumContext::from_settings(load_settings(quorum_path)?)
}

/// Price-feed and token providers configured for `customer`, in order.
pub fn customer_providers(
    ctx: &QuorumContext,
    customer: &CustomerContext,
    http: &HttpClient,
) -> Result<(Vec<AddressProvider>, Vec<AddressProvider>)> {
    let price_feeds =
        build_providers(&customer.config.price_feed_kinds(), &ctx.settings, http, &ctx.cache)
            .with_context(|| format!("Failed to set up price feed providers for {}", customer.name))?;
    let tokens = build_providers(&customer.config.token_kinds(), &ctx.settings, http, &ctx.cache)
        .with_context(|| format!("Failed to set up token providers for {}", customer.name))?;
    Ok((price_feeds, tokens))
}

/// Helper to print whether a directory exists.
pub fn print_dir_status(label: &str, path: &std::path::Path) {
    let exists = path.is_dir();
    println!("- {label}: {} ({})", if exists { "OK" } else { "MISSING" }, path.display());
}
