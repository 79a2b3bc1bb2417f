//! Domain models for Tally

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Label used when a transaction has no category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Label given to uncategorized transfers (payee starts with "Transfer")
pub const CREDIT_CARD_PAYMENT: &str = "Credit Card Payment";

/// Convert budgeting API milliunits (1/1000 of a currency unit) to major units
pub fn milliunits_to_amount(milliunits: i64) -> f64 {
    milliunits as f64 / 1000.0
}

/// Cleared/reconciled state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClearedStatus {
    Cleared,
    #[default]
    Uncleared,
    Reconciled,
}

impl ClearedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleared => "cleared",
            Self::Uncleared => "uncleared",
            Self::Reconciled => "reconciled",
        }
    }
}

impl std::str::FromStr for ClearedStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cleared" => Ok(Self::Cleared),
            "uncleared" => Ok(Self::Uncleared),
            "reconciled" => Ok(Self::Reconciled),
            _ => Err(format!("Unknown cleared status: {}", s)),
        }
    }
}

impl std::fmt::Display for ClearedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry from the budgeting API
///
/// Amounts are major currency units. Negative = outflow, positive = inflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub memo: Option<String>,
    pub cleared: ClearedStatus,
    pub approved: bool,
    pub account_id: String,
    pub account_name: String,
    pub payee_id: Option<String>,
    pub payee_name: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    /// Account on the other side of a transfer
    pub transfer_account_id: Option<String>,
    /// Matching transaction on the other side of a transfer
    pub transfer_transaction_id: Option<String>,
    pub deleted: bool,
}

impl Transaction {
    /// Create an approved, uncleared transaction with no payee or category
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        amount: f64,
        account_name: impl Into<String>,
    ) -> Self {
        let account_name = account_name.into();
        Self {
            id: id.into(),
            date,
            amount,
            memo: None,
            cleared: ClearedStatus::Uncleared,
            approved: true,
            account_id: account_name.to_lowercase().replace(' ', "-"),
            account_name,
            payee_id: None,
            payee_name: None,
            category_id: None,
            category_name: None,
            transfer_account_id: None,
            transfer_transaction_id: None,
            deleted: false,
        }
    }

    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.payee_name = Some(payee.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category_name = Some(category.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_cleared(mut self, cleared: ClearedStatus) -> Self {
        self.cleared = cleared;
        self
    }

    pub fn mark_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Whether money left the account
    pub fn is_outflow(&self) -> bool {
        self.amount < 0.0
    }

    /// Whether money entered the account
    pub fn is_inflow(&self) -> bool {
        self.amount > 0.0
    }

    /// Resolved grouping label
    ///
    /// Uncategorized payees starting with "Transfer" are credit card payments;
    /// everything else without a category is "Uncategorized". A blank
    /// category name counts as no category.
    pub fn category_label(&self) -> &str {
        let category = self.category_name.as_deref().filter(|c| !c.is_empty());
        match (category, self.payee_name.as_deref()) {
            (Some(category), _) => category,
            (None, Some(payee)) if payee.starts_with("Transfer") => CREDIT_CARD_PAYMENT,
            (None, _) => UNCATEGORIZED,
        }
    }

    /// Calendar month key (`YYYY-MM`) of the transaction date
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.date.year(), self.date.month())
    }
}

/// A budget available to the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub last_modified_on: Option<DateTime<Utc>>,
}

/// Optional narrowing applied before analysis
///
/// Every field is optional; an absent field means no filtering on that
/// dimension. Present fields combine with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Inclusive start date
    pub start_date: Option<NaiveDate>,
    /// Inclusive end date
    pub end_date: Option<NaiveDate>,
    /// Account ids or names to keep
    pub accounts: Option<HashSet<String>>,
    /// Resolved category labels to drop
    pub excluded_categories: Option<HashSet<String>>,
    /// Minimum absolute amount to keep
    pub min_amount: Option<f64>,
}

impl FilterConfig {
    /// Whether a (non-deleted) transaction passes every present filter
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(start) = self.start_date {
            if tx.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if tx.date > end {
                return false;
            }
        }
        if let Some(ref accounts) = self.accounts {
            if !accounts.contains(&tx.account_id) && !accounts.contains(&tx.account_name) {
                return false;
            }
        }
        if let Some(ref excluded) = self.excluded_categories {
            if excluded.contains(tx.category_label()) {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if tx.amount.abs() < min {
                return false;
            }
        }
        true
    }
}
