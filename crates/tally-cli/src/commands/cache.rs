//! Cache command implementation

use anyhow::Result;
use tally_core::{Config, TransactionCache};

pub fn cmd_cache_clear(config: &Config) -> Result<()> {
    let cache = TransactionCache::new(config.cache_dir(), config.cache_ttl);
    let removed = cache.clear()?;
    println!("✓ Removed {} cached entr{}", removed, if removed == 1 { "y" } else { "ies" });
    Ok(())
}
