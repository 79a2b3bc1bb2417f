//! System prompt assembly
//!
//! The chat model sees three things before the user's question: role
//! instructions, a compact JSON summary of the current insights, and whatever
//! the user has told us about themselves.

use serde::Serialize;

use crate::analysis::{FinancialInsights, MonthlyTrend};
use crate::store::{BudgetSelection, UserContext};

const TOP_CATEGORIES: usize = 5;
const TOP_OPPORTUNITIES: usize = 3;

const ROLE_INSTRUCTIONS: &str = "You are Tally, a personal budgeting assistant. \
You help the user understand their spending and find realistic ways to save. \
Base every figure you quote on the insights below or on tool results; never invent numbers. \
Amounts are in the budget's currency; negative amounts are money spent. \
Use the tools to refresh data, list transactions, render reports or switch budgets when that \
helps answer the question. Keep answers short and practical.";

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub total: f64,
    pub percentage: f64,
    pub trend: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunitySummary {
    pub kind: String,
    pub category: String,
    pub description: String,
    pub potential_savings: f64,
    pub confidence: String,
}

/// What the model gets to see of a `FinancialInsights`
#[derive(Debug, Clone, Serialize)]
pub struct InsightsSummary {
    pub total_spent: f64,
    pub total_income: f64,
    pub net_cash_flow: f64,
    pub total_potential_savings: f64,
    pub top_categories: Vec<CategorySummary>,
    pub top_opportunities: Vec<OpportunitySummary>,
    pub months: Vec<MonthlyTrend>,
    pub outlier_count: usize,
}

impl InsightsSummary {
    pub fn from_insights(insights: &FinancialInsights) -> Self {
        Self {
            total_spent: round2(insights.total_spent),
            total_income: round2(insights.total_income),
            net_cash_flow: round2(insights.net_cash_flow),
            total_potential_savings: round2(insights.total_potential_savings()),
            top_categories: insights
                .spending_patterns
                .iter()
                .take(TOP_CATEGORIES)
                .map(|p| CategorySummary {
                    category: p.category.clone(),
                    total: round2(p.total_amount),
                    percentage: round2(p.percentage_of_total),
                    trend: p.trend.to_string(),
                })
                .collect(),
            top_opportunities: insights
                .savings_opportunities
                .iter()
                .take(TOP_OPPORTUNITIES)
                .map(|o| OpportunitySummary {
                    kind: o.kind.to_string(),
                    category: o.category.clone(),
                    description: o.description.clone(),
                    potential_savings: round2(o.potential_savings),
                    confidence: o.confidence.to_string(),
                })
                .collect(),
            months: insights.monthly_trends.clone(),
            outlier_count: insights.outliers.len(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Full system prompt for a chat session
pub fn build_system_prompt(
    insights: &FinancialInsights,
    user_context: &UserContext,
    budget: Option<&BudgetSelection>,
) -> String {
    let summary = InsightsSummary::from_insights(insights);
    let summary_json = serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".into());

    let budget_line = match budget {
        Some(b) => format!("Current budget: {} ({})", b.name, b.id),
        None => "No budget is selected. Ask the user to pick one with change_budget.".to_string(),
    };

    format!(
        "{}\n\n{}\n\n## Financial insights\n{}\n\n## About the user\n{}",
        ROLE_INSTRUCTIONS,
        budget_line,
        summary_json,
        user_context.render()
    )
}
