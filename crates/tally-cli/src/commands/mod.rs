//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `budgets` - List and select budgets
//! - `sync` - Re-download transactions
//! - `analyze` - Spending analysis with optional filters
//! - `reports` - Plain-text reports
//! - `transactions` - Filtered transaction listing and CSV export
//! - `chat` - Assistant (one-shot or interactive)
//! - `cache` - Cache maintenance
//! - `context` - Saved user context

pub mod analyze;
pub mod budgets;
pub mod cache;
pub mod chat;
pub mod context;
pub mod reports;
pub mod sync;
pub mod transactions;

// Re-export command functions for main.rs
pub use analyze::*;
pub use budgets::*;
pub use cache::*;
pub use chat::*;
pub use context::*;
pub use reports::*;
pub use sync::*;
pub use transactions::*;

use anyhow::{Context as _, Result};
use tally_core::{
    BudgetSelection, Config, Store, Transaction, TransactionCache, TransactionService, YnabClient,
};

/// Budgeting API client fronted by the cache
pub fn open_service(config: &Config) -> Result<TransactionService> {
    let token = config.require_budget_token()?;
    let client = YnabClient::new(&config.budget_api_url, token, config.http_timeout)
        .context("Failed to create budgeting API client")?;
    let cache = TransactionCache::new(config.cache_dir(), config.cache_ttl);
    Ok(TransactionService::new(Box::new(client), cache))
}

pub fn open_store(config: &Config) -> Store {
    Store::new(config.user_context_path(), config.budget_selection_path())
}

/// The selected budget, or an error telling the user how to pick one
pub fn require_selection(store: &Store) -> Result<BudgetSelection> {
    store
        .load_selection()?
        .ok_or_else(|| anyhow::anyhow!("No budget selected. Run 'tally budgets select <name>' first."))
}

/// Transactions for the selected budget over `months` (config default when absent)
pub async fn load_transactions(
    config: &Config,
    months: Option<u32>,
) -> Result<(BudgetSelection, Vec<Transaction>)> {
    let store = open_store(config);
    let budget = require_selection(&store)?;
    let service = open_service(config)?;
    let months = months.unwrap_or(config.default_months);

    let transactions = service
        .fetch(&budget.id, months, false)
        .await
        .with_context(|| format!("Failed to fetch transactions for {}", budget.name))?;
    Ok((budget, transactions))
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Red for outflows, green for inflows
pub fn colored_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("\x1b[31m{:>11}\x1b[0m", tally_core::format_currency(amount))
    } else {
        format!("\x1b[32m{:>11}\x1b[0m", format!("+{}", tally_core::format_currency(amount)))
    }
}
