//! Assistant tools
//!
//! The chat model can ask for a fixed set of local operations. Each tool has
//! a typed parameter record; raw JSON from the model is decoded into a
//! `ToolCall` at the dispatch boundary, so bad names or params become a
//! failed `ToolOutcome` instead of an error. Only failures talking to the
//! budgeting API (or the local disk) surface as `Err`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ai::Tool;
use crate::analysis::{analyze, FinancialInsights};
use crate::budget::TransactionService;
use crate::error::{Error, Result};
use crate::models::Transaction;
use crate::report::{render_report, ReportKind};
use crate::store::{BudgetSelection, Store};

/// Default and maximum rows for `list_transactions`
pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;

/// Longest history a tool may request
const MAX_MONTHS: u32 = 36;

// =============================================================================
// Parameters
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize, schemars::JsonSchema)]
pub struct SyncParams {
    #[schemars(description = "Months of history to fetch, counting the current month (default from config)")]
    pub months: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, schemars::JsonSchema)]
pub struct ClearCacheParams {}

/// Part of the analysis to return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisFocus {
    #[default]
    All,
    Spending,
    Savings,
    Trends,
    Outliers,
}

impl AnalysisFocus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisFocus::All => "all",
            AnalysisFocus::Spending => "spending",
            AnalysisFocus::Savings => "savings",
            AnalysisFocus::Trends => "trends",
            AnalysisFocus::Outliers => "outliers",
        }
    }
}

impl fmt::Display for AnalysisFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalysisFocus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(AnalysisFocus::All),
            "spending" => Ok(AnalysisFocus::Spending),
            "savings" => Ok(AnalysisFocus::Savings),
            "trends" => Ok(AnalysisFocus::Trends),
            "outliers" => Ok(AnalysisFocus::Outliers),
            _ => Err(format!("Unknown focus: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, schemars::JsonSchema)]
pub struct AnalyzeParams {
    #[schemars(description = "Months of history to analyze, counting the current month")]
    pub months: Option<u32>,

    #[schemars(description = "Part of the analysis to return: all, spending, savings, trends, outliers")]
    pub focus: Option<AnalysisFocus>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, schemars::JsonSchema)]
pub struct ReportParams {
    #[serde(rename = "type")]
    #[schemars(description = "Report type: summary, detailed, savings, trends")]
    pub kind: ReportKind,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, schemars::JsonSchema)]
pub struct ChangeBudgetParams {
    #[schemars(description = "Budget id or name to switch to. Omit to list the available budgets and ask the user")]
    pub budget: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, schemars::JsonSchema)]
pub struct ListTransactionsParams {
    #[schemars(description = "Case-insensitive substring of the category name")]
    pub category: Option<String>,

    #[schemars(description = "Case-insensitive substring of the payee name")]
    pub payee: Option<String>,

    #[schemars(description = "Maximum rows to return (default 20, max 100)")]
    pub limit: Option<usize>,

    #[schemars(description = "Minimum absolute amount")]
    pub min_amount: Option<f64>,

    #[schemars(description = "Maximum absolute amount")]
    pub max_amount: Option<f64>,
}

/// A decoded, validated tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SyncTransactions(SyncParams),
    ClearCache(ClearCacheParams),
    AnalyzeTransactions(AnalyzeParams),
    GenerateReport(ReportParams),
    ChangeBudget(ChangeBudgetParams),
    ListTransactions(ListTransactionsParams),
}

impl ToolCall {
    /// Decode a raw tool invocation; the error string is shown to the model
    pub fn decode(name: &str, input: &Value) -> std::result::Result<Self, String> {
        // Models sometimes send null for parameterless tools
        let input = if input.is_null() {
            json!({})
        } else {
            input.clone()
        };

        fn params<P: serde::de::DeserializeOwned>(
            name: &str,
            input: Value,
        ) -> std::result::Result<P, String> {
            serde_json::from_value(input)
                .map_err(|e| format!("Invalid parameters for {}: {}", name, e))
        }

        let call = match name {
            "sync_transactions" => ToolCall::SyncTransactions(params(name, input)?),
            "clear_cache" => ToolCall::ClearCache(params(name, input)?),
            "analyze_transactions" => ToolCall::AnalyzeTransactions(params(name, input)?),
            "generate_report" => ToolCall::GenerateReport(params(name, input)?),
            "change_budget" => ToolCall::ChangeBudget(params(name, input)?),
            "list_transactions" => ToolCall::ListTransactions(params(name, input)?),
            _ => return Err(format!("Unknown tool: {}", name)),
        };

        call.validate()?;
        Ok(call)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let months = match self {
            ToolCall::SyncTransactions(p) => p.months,
            ToolCall::AnalyzeTransactions(p) => p.months,
            _ => None,
        };
        if let Some(months) = months {
            if months == 0 || months > MAX_MONTHS {
                return Err(format!("months must be between 1 and {}", MAX_MONTHS));
            }
        }

        if let ToolCall::ListTransactions(p) = self {
            if let (Some(min), Some(max)) = (p.min_amount, p.max_amount) {
                if min > max {
                    return Err("min_amount must not exceed max_amount".into());
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::SyncTransactions(_) => "sync_transactions",
            ToolCall::ClearCache(_) => "clear_cache",
            ToolCall::AnalyzeTransactions(_) => "analyze_transactions",
            ToolCall::GenerateReport(_) => "generate_report",
            ToolCall::ChangeBudget(_) => "change_budget",
            ToolCall::ListTransactions(_) => "list_transactions",
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What a tool reports back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Text sent back as the tool result
    pub fn render(&self) -> String {
        match &self.data {
            Some(data) => format!(
                "{}\n\n{}",
                self.message,
                serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
            ),
            None => self.message.clone(),
        }
    }
}

/// Row returned by `list_transactions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: String,
    pub date: String,
    pub payee: Option<String>,
    pub category: String,
    pub amount: f64,
    pub account: String,
    pub memo: Option<String>,
}

impl From<&Transaction> for TransactionSummary {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            date: tx.date.to_string(),
            payee: tx.payee_name.clone(),
            category: tx.category_label().to_string(),
            amount: tx.amount,
            account: tx.account_name.clone(),
            memo: tx.memo.clone(),
        }
    }
}

/// Non-deleted transactions matching the filters, newest first
pub fn filter_transactions<'a>(
    transactions: &'a [Transaction],
    params: &ListTransactionsParams,
) -> Vec<&'a Transaction> {
    let category = params.category.as_deref().map(str::to_lowercase);
    let payee = params.payee.as_deref().map(str::to_lowercase);

    let mut matched: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| !t.deleted)
        .filter(|t| {
            category
                .as_deref()
                .map_or(true, |c| t.category_label().to_lowercase().contains(c))
        })
        .filter(|t| {
            payee.as_deref().map_or(true, |p| {
                t.payee_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(p))
            })
        })
        .filter(|t| {
            let amount = t.amount.abs();
            let min_ok = params.min_amount.map_or(true, |min| amount >= min);
            let max_ok = params.max_amount.map_or(true, |max| amount <= max);
            min_ok && max_ok
        })
        .collect();

    matched.sort_by(|a, b| b.date.cmp(&a.date));
    matched
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Runs tool calls against the transaction service and persisted records
pub struct ToolDispatcher {
    service: TransactionService,
    store: Store,
    default_months: u32,
}

impl ToolDispatcher {
    pub fn new(service: TransactionService, store: Store, default_months: u32) -> Self {
        Self {
            service,
            store,
            default_months: default_months.max(1),
        }
    }

    pub fn service(&self) -> &TransactionService {
        &self.service
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Decode and run a raw invocation from the model
    pub async fn dispatch(&self, name: &str, input: &Value) -> Result<ToolOutcome> {
        match ToolCall::decode(name, input) {
            Ok(call) => self.execute(call).await,
            Err(message) => {
                tracing::warn!(tool = name, error = %message, "Rejected tool call");
                Ok(ToolOutcome::failure(message))
            }
        }
    }

    /// Run a decoded call
    pub async fn execute(&self, call: ToolCall) -> Result<ToolOutcome> {
        tracing::debug!(tool = call.name(), "Executing tool");
        match call {
            ToolCall::SyncTransactions(p) => self.sync_transactions(p).await,
            ToolCall::ClearCache(_) => self.clear_cache(),
            ToolCall::AnalyzeTransactions(p) => self.analyze_transactions(p).await,
            ToolCall::GenerateReport(p) => self.generate_report(p).await,
            ToolCall::ChangeBudget(p) => self.change_budget(p).await,
            ToolCall::ListTransactions(p) => self.list_transactions(p).await,
        }
    }

    fn selected_budget(&self) -> Result<Option<BudgetSelection>> {
        self.store.load_selection()
    }

    async fn sync_transactions(&self, params: SyncParams) -> Result<ToolOutcome> {
        let Some(budget) = self.selected_budget()? else {
            return Ok(no_budget());
        };
        let months = params.months.unwrap_or(self.default_months);
        let transactions = self.service.fetch(&budget.id, months, true).await?;

        Ok(ToolOutcome::success(format!(
            "Synced {} transactions from the last {} month(s) of {}",
            transactions.len(),
            months,
            budget.name
        ))
        .with_data(json!({ "budget": budget.name, "months": months, "count": transactions.len() })))
    }

    fn clear_cache(&self) -> Result<ToolOutcome> {
        let removed = self.service.clear_cache()?;
        Ok(ToolOutcome::success(format!("Cleared {} cached entries", removed))
            .with_data(json!({ "removed": removed })))
    }

    async fn insights(&self, months: Option<u32>) -> Result<Option<(BudgetSelection, FinancialInsights)>> {
        let Some(budget) = self.selected_budget()? else {
            return Ok(None);
        };
        let months = months.unwrap_or(self.default_months);
        let transactions = self.service.fetch(&budget.id, months, false).await?;
        Ok(Some((budget, analyze(&transactions, None))))
    }

    async fn analyze_transactions(&self, params: AnalyzeParams) -> Result<ToolOutcome> {
        let Some((budget, insights)) = self.insights(params.months).await? else {
            return Ok(no_budget());
        };
        let focus = params.focus.unwrap_or_default();

        let data = match focus {
            AnalysisFocus::All => serde_json::to_value(&insights)?,
            AnalysisFocus::Spending => json!({
                "total_spent": insights.total_spent,
                "spending_patterns": insights.spending_patterns,
            }),
            AnalysisFocus::Savings => json!({
                "total_potential_savings": insights.total_potential_savings(),
                "savings_opportunities": insights.savings_opportunities,
            }),
            AnalysisFocus::Trends => json!({
                "monthly_trends": insights.monthly_trends,
                "category_trends": insights
                    .spending_patterns
                    .iter()
                    .map(|p| json!({ "category": p.category, "trend": p.trend }))
                    .collect::<Vec<_>>(),
            }),
            AnalysisFocus::Outliers => json!({ "outliers": insights.outliers }),
        };

        Ok(ToolOutcome::success(format!(
            "Analysis of {} ({} focus): spent {:.2}, income {:.2}, {} opportunities",
            budget.name,
            focus,
            insights.total_spent,
            insights.total_income,
            insights.savings_opportunities.len()
        ))
        .with_data(data))
    }

    async fn generate_report(&self, params: ReportParams) -> Result<ToolOutcome> {
        let Some((_, insights)) = self.insights(None).await? else {
            return Ok(no_budget());
        };
        Ok(ToolOutcome::success(render_report(params.kind, &insights)))
    }

    async fn change_budget(&self, params: ChangeBudgetParams) -> Result<ToolOutcome> {
        match params.budget.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(wanted) => match self.service.resolve_budget(wanted).await {
                Ok(budget) => {
                    let selection = BudgetSelection::new(&budget.id, &budget.name);
                    self.store.save_selection(&selection)?;
                    Ok(ToolOutcome::success(format!("Switched to budget {}", budget.name))
                        .with_data(json!({ "id": budget.id, "name": budget.name })))
                }
                Err(Error::NotFound(_)) => Ok(ToolOutcome::failure(format!(
                    "No budget matches '{}'",
                    wanted
                ))),
                Err(e) => Err(e),
            },
            None => {
                self.store.clear_selection()?;
                let budgets = self.service.list_budgets().await?;
                let names: Vec<&str> = budgets.iter().map(|b| b.name.as_str()).collect();
                Ok(ToolOutcome::success(format!(
                    "Budget selection cleared. Available budgets: {}",
                    names.join(", ")
                ))
                .with_data(json!({
                    "needs_selection": true,
                    "budgets": budgets
                        .iter()
                        .map(|b| json!({ "id": b.id, "name": b.name }))
                        .collect::<Vec<_>>(),
                })))
            }
        }
    }

    async fn list_transactions(&self, params: ListTransactionsParams) -> Result<ToolOutcome> {
        let Some(budget) = self.selected_budget()? else {
            return Ok(no_budget());
        };
        let transactions = self
            .service
            .fetch(&budget.id, self.default_months, false)
            .await?;

        let limit = params
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let matched = filter_transactions(&transactions, &params);
        let rows: Vec<TransactionSummary> = matched
            .iter()
            .take(limit)
            .map(|t| TransactionSummary::from(*t))
            .collect();

        Ok(ToolOutcome::success(format!(
            "Showing {} of {} matching transactions",
            rows.len(),
            matched.len()
        ))
        .with_data(json!({ "total_count": matched.len(), "transactions": rows })))
    }
}

fn no_budget() -> ToolOutcome {
    ToolOutcome::failure("No budget selected. Call change_budget first.")
}

/// Tool definitions offered to the chat model
pub fn assistant_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "sync_transactions",
            "Re-download transactions for the selected budget, bypassing the cache.",
            schemars::schema_for!(SyncParams).into(),
        ),
        Tool::new(
            "clear_cache",
            "Delete all cached transaction downloads.",
            schemars::schema_for!(ClearCacheParams).into(),
        ),
        Tool::new(
            "analyze_transactions",
            "Run the spending analysis: totals, categories, trends, savings opportunities, outliers.",
            schemars::schema_for!(AnalyzeParams).into(),
        ),
        Tool::new(
            "generate_report",
            "Render a plain-text report (summary, detailed, savings or trends).",
            schemars::schema_for!(ReportParams).into(),
        ),
        Tool::new(
            "change_budget",
            "Switch to another budget by id or name, or list budgets when none is given.",
            schemars::schema_for!(ChangeBudgetParams).into(),
        ),
        Tool::new(
            "list_transactions",
            "List recent transactions filtered by category, payee or amount, newest first.",
            schemars::schema_for!(ListTransactionsParams).into(),
        ),
    ]
}
