//! Transaction source
//!
//! - `BudgetSource` trait: where transactions come from
//! - `YnabClient`: the hosted budgeting API
//! - `TransactionService`: a source fronted by the on-disk cache

mod ynab;

pub use ynab::{ApiTransaction, YnabClient};

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};

use crate::cache::TransactionCache;
use crate::error::{Error, Result};
use crate::models::{Budget, Transaction};

/// Supplies budgets and their transactions
#[async_trait]
pub trait BudgetSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Budgets visible to the authenticated user
    async fn list_budgets(&self) -> Result<Vec<Budget>>;

    /// Every transaction dated on or after `since`, deleted ones included
    async fn fetch_transactions(&self, budget_id: &str, since: NaiveDate)
        -> Result<Vec<Transaction>>;
}

/// First day of the month `months - 1` months before `today`
///
/// One month means "since the start of this month".
pub fn since_date(today: NaiveDate, months: u32) -> NaiveDate {
    let first_of_month = today.with_day(1).unwrap_or(today);
    first_of_month
        .checked_sub_months(Months::new(months.max(1) - 1))
        .unwrap_or(first_of_month)
}

/// Find a budget by exact id, then by case-insensitive name
pub fn find_budget<'a>(budgets: &'a [Budget], id_or_name: &str) -> Option<&'a Budget> {
    budgets.iter().find(|b| b.id == id_or_name).or_else(|| {
        budgets
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(id_or_name))
    })
}

/// Fetches transactions through the cache
pub struct TransactionService {
    source: Box<dyn BudgetSource>,
    cache: TransactionCache,
}

impl TransactionService {
    pub fn new(source: Box<dyn BudgetSource>, cache: TransactionCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &TransactionCache {
        &self.cache
    }

    pub async fn list_budgets(&self) -> Result<Vec<Budget>> {
        self.source.list_budgets().await
    }

    /// Resolve a budget id or name against the source's budget list
    pub async fn resolve_budget(&self, id_or_name: &str) -> Result<Budget> {
        let budgets = self.source.list_budgets().await?;
        find_budget(&budgets, id_or_name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Budget '{}'", id_or_name)))
    }

    /// Transactions for the last `months` calendar months (current one included)
    pub async fn fetch(
        &self,
        budget_id: &str,
        months: u32,
        bypass_cache: bool,
    ) -> Result<Vec<Transaction>> {
        let today = chrono::Local::now().date_naive();
        self.fetch_since(budget_id, since_date(today, months), months, bypass_cache)
            .await
    }

    /// Transactions on or after `since`; `months` only participates in the cache key
    pub async fn fetch_since(
        &self,
        budget_id: &str,
        since: NaiveDate,
        months: u32,
        bypass_cache: bool,
    ) -> Result<Vec<Transaction>> {
        let key = TransactionCache::key(budget_id, since, months);

        if !bypass_cache {
            if let Some(cached) = self.cache.get(&key)? {
                tracing::debug!(budget_id, count = cached.len(), "Using cached transactions");
                return Ok(cached);
            }
        }

        let transactions = self.source.fetch_transactions(budget_id, since).await?;
        if let Err(e) = self.cache.put(&key, &transactions) {
            tracing::warn!(error = %e, "Failed to write transaction cache");
        }

        tracing::info!(
            source = self.source.name(),
            budget_id,
            since = %since,
            count = transactions.len(),
            "Fetched transactions"
        );
        Ok(transactions)
    }

    /// Drop every cached fetch
    pub fn clear_cache(&self) -> Result<usize> {
        self.cache.clear()
    }
}
