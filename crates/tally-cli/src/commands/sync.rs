//! Sync command implementation

use anyhow::{Context as _, Result};
use tally_core::Config;

use super::{open_service, open_store, require_selection};

/// Re-download transactions, bypassing and refreshing the cache
pub async fn cmd_sync(config: &Config, months: Option<u32>) -> Result<()> {
    let budget = require_selection(&open_store(config))?;
    let service = open_service(config)?;
    let months = months.unwrap_or(config.default_months);
    if months == 0 {
        anyhow::bail!("--months must be at least 1");
    }

    let transactions = service
        .fetch(&budget.id, months, true)
        .await
        .with_context(|| format!("Failed to sync {}", budget.name))?;

    let active = transactions.iter().filter(|t| !t.deleted).count();
    println!(
        "✓ Synced {} transactions ({} active) from the last {} month(s) of {}",
        transactions.len(),
        active,
        months,
        budget.name
    );
    Ok(())
}
