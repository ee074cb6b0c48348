use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::cache::AddressCache;
use crate::project::{load_ground_truth, CustomerConfig, QuorumLayout, QuorumSettings};

/// Convenience wrapper bundling settings, layout, and the opened address cache.
#[derive(Debug)]
pub struct QuorumContext {
    pub settings: QuorumSettings,
    pub layout: QuorumLayout,
    pub cache: Arc<AddressCache>,
}

impl QuorumContext {
    /// Compute the layout for the configured main path and open the cache.
    pub fn from_settings(settings: QuorumSettings) -> Result<Self> {
        let layout = QuorumLayout::new(&settings.main_path);
        let cache = AddressCache::open(&layout.cache_db_path).with_context(|| {
            format!("Failed to open address cache at {}", layout.cache_db_path.display())
        })?;
        Ok(Self { settings, layout, cache: Arc::new(cache) })
    }

    /// Load the named customer from the ground truth file.
    pub fn customer(&self, name: &str) -> Result<CustomerContext> {
        let ground_truth = load_ground_truth(&self.layout)?;
        let (key, config) = ground_truth
            .customer(name)
            .ok_or_else(|| anyhow!("Customer {name} not found in ground truth data"))?;
        Ok(CustomerContext { name: key.to_string(), config: config.clone() })
    }
}

/// A customer name as spelled in the ground truth plus its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerContext {
    pub name: String,
    pub config: CustomerConfig,
}
