//! Core types for the transaction analyzer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::Transaction;

/// Direction of a category's month-over-month spending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TrendDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increasing" => Ok(TrendDirection::Increasing),
            "decreasing" => Ok(TrendDirection::Decreasing),
            "stable" => Ok(TrendDirection::Stable),
            _ => Err(format!("Unknown trend: {}", s)),
        }
    }
}

/// How sure a detector is about an opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            _ => Err(format!("Unknown confidence: {}", s)),
        }
    }
}

/// Heuristic that produced a savings opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    /// Same payee, near-constant amount, repeated
    RecurringSubscription,
    /// Many purchases under the small-purchase threshold in one category
    HighFrequencySmall,
    /// Category spending above its budgeted amount
    CategoryOverspend,
    /// One purchase far above the category's typical amount
    UnusualSpike,
}

impl OpportunityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityKind::RecurringSubscription => "recurring_subscription",
            OpportunityKind::HighFrequencySmall => "high_frequency_small",
            OpportunityKind::CategoryOverspend => "category_overspend",
            OpportunityKind::UnusualSpike => "unusual_spike",
        }
    }
}

impl fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpportunityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recurring_subscription" => Ok(OpportunityKind::RecurringSubscription),
            "high_frequency_small" => Ok(OpportunityKind::HighFrequencySmall),
            "category_overspend" => Ok(OpportunityKind::CategoryOverspend),
            "unusual_spike" => Ok(OpportunityKind::UnusualSpike),
            _ => Err(format!("Unknown opportunity kind: {}", s)),
        }
    }
}

/// Outflow statistics for one category label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingPattern {
    pub category: String,
    pub total_amount: f64,
    pub transaction_count: usize,
    pub average_amount: f64,
    /// Total divided by the number of distinct calendar months present
    pub monthly_average: f64,
    pub trend: TrendDirection,
    pub percentage_of_total: f64,
}

/// A heuristically detected way to spend less
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsOpportunity {
    pub kind: OpportunityKind,
    pub category: String,
    pub description: String,
    pub potential_savings: f64,
    pub confidence: Confidence,
    pub recommendations: Vec<String>,
    /// Supporting transactions
    pub transactions: Vec<Transaction>,
}

impl SavingsOpportunity {
    pub fn new(
        kind: OpportunityKind,
        category: impl Into<String>,
        description: impl Into<String>,
        potential_savings: f64,
        confidence: Confidence,
    ) -> Self {
        Self {
            kind,
            category: category.into(),
            description: description.into(),
            potential_savings,
            confidence,
            recommendations: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions;
        self
    }
}

/// Budgeted vs. actual spending for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetComparison {
    pub category: String,
    pub budgeted: f64,
    pub actual: f64,
    /// budgeted - actual (negative = overspent)
    pub difference: f64,
}

/// Cash flow for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// `YYYY-MM`
    pub month: String,
    pub spent: f64,
    pub income: f64,
    pub net_flow: f64,
}

/// Complete output of one analyzer run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialInsights {
    pub total_spent: f64,
    pub total_income: f64,
    pub net_cash_flow: f64,
    /// Descending by total amount
    pub spending_patterns: Vec<SpendingPattern>,
    /// Descending by potential savings
    pub savings_opportunities: Vec<SavingsOpportunity>,
    /// Always empty until budget data is wired in
    pub budget_analysis: Vec<BudgetComparison>,
    pub outliers: Vec<Transaction>,
    /// Ascending by month
    pub monthly_trends: Vec<MonthlyTrend>,
}

impl FinancialInsights {
    /// Sum of potential savings across all opportunities
    pub fn total_potential_savings(&self) -> f64 {
        self.savings_opportunities
            .iter()
            .map(|o| o.potential_savings)
            .sum()
    }
}
