//! Integration tests for tally-core
//!
//! These exercise the fetch → analyze → report / chat workflow through the
//! public API, with an in-memory budget source and a scripted chat backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use tally_core::{
    ai::MessagesResponse,
    analysis::{OpportunityKind, TrendDirection},
    analyze, build_system_prompt, render_report, Budget, BudgetSelection, BudgetSource,
    ChatBackend, ChatOrchestrator, Config, FilterConfig, Message, MockChatBackend, ReportKind,
    Result, Store, Transaction, TransactionCache, TransactionService, ToolDispatcher,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Three months of a small household budget
fn household() -> Vec<Transaction> {
    let mut txs = Vec::new();
    for m in 1..=3 {
        txs.push(
            Transaction::new(format!("stream-{}", m), date(2024, m, 1), -9.99, "Checking")
                .with_payee("StreamCo")
                .with_category("Subscriptions"),
        );
        txs.push(
            Transaction::new(format!("rent-{}", m), date(2024, m, 3), -1200.0, "Checking")
                .with_category("Rent"),
        );
        txs.push(
            Transaction::new(format!("pay-{}", m), date(2024, m, 15), 3500.0, "Checking")
                .with_payee("Acme Corp")
                .with_category("Inflow: Ready to Assign"),
        );
    }
    for (i, amount) in [40.0, 80.0, 160.0].iter().enumerate() {
        txs.push(
            Transaction::new(
                format!("dining-{}", i),
                date(2024, i as u32 + 1, 20),
                -amount,
                "Visa",
            )
            .with_payee(format!("Restaurant {}", i))
            .with_category("Dining Out"),
        );
    }
    txs.push(
        Transaction::new("gone", date(2024, 2, 9), -999.0, "Checking")
            .with_category("Rent")
            .mark_deleted(),
    );
    txs
}

struct MemorySource(Vec<Transaction>);

#[async_trait]
impl BudgetSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_budgets(&self) -> Result<Vec<Budget>> {
        Ok(vec![Budget {
            id: "home".into(),
            name: "Home".into(),
            last_modified_on: None,
        }])
    }

    async fn fetch_transactions(&self, _budget_id: &str, since: NaiveDate) -> Result<Vec<Transaction>> {
        Ok(self.0.iter().filter(|t| t.date >= since).cloned().collect())
    }
}

fn service(dir: &std::path::Path) -> TransactionService {
    TransactionService::new(
        Box::new(MemorySource(household())),
        TransactionCache::new(dir.join("cache"), Duration::from_secs(3600)),
    )
}

// =============================================================================
// Analysis
// =============================================================================

#[tokio::test]
async fn test_fetch_analyze_report_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let transactions = service
        .fetch_since("home", date(2024, 1, 1), 3, false)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 13);

    let insights = analyze(&transactions, None);
    assert!((insights.total_spent - (3.0 * 9.99 + 3600.0 + 280.0)).abs() < 1e-9);
    assert_eq!(insights.total_income, 10500.0);
    assert_eq!(
        insights.net_cash_flow,
        insights.total_income - insights.total_spent
    );

    let dining = insights
        .spending_patterns
        .iter()
        .find(|p| p.category == "Dining Out")
        .unwrap();
    assert_eq!(dining.trend, TrendDirection::Increasing);

    assert!(insights
        .savings_opportunities
        .iter()
        .any(|o| o.kind == OpportunityKind::RecurringSubscription && o.description.contains("StreamCo")));

    let report = render_report(ReportKind::Detailed, &insights);
    assert!(report.contains("Dining Out"));
    assert!(report.contains("$10,500.00"));
}

#[test]
fn test_filters_narrow_analysis() {
    let filter = FilterConfig {
        start_date: Some(date(2024, 2, 1)),
        excluded_categories: Some(["Rent".to_string()].into_iter().collect()),
        ..Default::default()
    };
    let insights = analyze(&household(), Some(&filter));

    assert!(insights
        .spending_patterns
        .iter()
        .all(|p| p.category != "Rent"));
    assert_eq!(insights.monthly_trends.len(), 2);
}

#[test]
fn test_analysis_is_idempotent_and_consistent() {
    let txs = household();
    let first = analyze(&txs, None);
    assert_eq!(first, analyze(&txs, None));

    let pattern_total: f64 = first.spending_patterns.iter().map(|p| p.total_amount).sum();
    assert!((pattern_total - first.total_spent).abs() < 1e-6);

    let pct: f64 = first
        .spending_patterns
        .iter()
        .map(|p| p.percentage_of_total)
        .sum();
    assert!((pct - 100.0).abs() < 1e-6);
}

// =============================================================================
// Chat
// =============================================================================

/// Keeps a handle on the scripted backend after handing it over
struct SharedBackend(Arc<MockChatBackend>);

#[async_trait]
impl ChatBackend for SharedBackend {
    fn model(&self) -> &str {
        "shared-mock"
    }

    async fn messages(
        &self,
        system: Option<&str>,
        messages: Vec<Message>,
        tools: Option<&[tally_core::ai::Tool]>,
    ) -> Result<MessagesResponse> {
        self.0.messages(system, messages, tools).await
    }
}

#[tokio::test]
async fn test_chat_turn_with_report_tool() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::in_dir(dir.path());
    store
        .save_selection(&BudgetSelection::new("home", "Home"))
        .unwrap();

    let mock = Arc::new(MockChatBackend::new(vec![
        MockChatBackend::tool_use("t1", "generate_report", json!({ "type": "savings" })),
        MockChatBackend::text("Cancelling StreamCo saves about $120 a year."),
    ]));
    let dispatcher = ToolDispatcher::new(service(dir.path()), Store::in_dir(dir.path()), 3);
    let orchestrator = ChatOrchestrator::new(Box::new(SharedBackend(mock.clone())), dispatcher);

    let insights = analyze(&household(), None);
    let context = store.load_context().unwrap();
    let selection = store.load_selection().unwrap();
    let system = build_system_prompt(&insights, &context, selection.as_ref());

    let result = orchestrator
        .execute_with_tracking(&system, "How can I save?", vec![])
        .await
        .unwrap();

    assert_eq!(result.iterations, 2);
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].name, "generate_report");
    assert!(result.tool_calls[0].success);
    assert_eq!(result.messages.len(), 2);
    assert!(result.response.contains("StreamCo"));

    let requests = mock.requests();
    assert!(requests[0].system.as_deref().unwrap().contains("Current budget: Home"));
}

// =============================================================================
// Configuration and persistence
// =============================================================================

#[test]
fn test_config_file_feeds_components() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            "[storage]\ndata_dir = \"{}\"\ncache_ttl_hours = 2\n\n[budget]\ndefault_months = 6\n",
            dir.path().join("data").display()
        ),
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.default_months, 6);
    assert_eq!(config.cache_ttl, Duration::from_secs(2 * 3600));
    assert!(config.cache_dir().starts_with(dir.path().join("data")));

    let store = Store::new(config.user_context_path(), config.budget_selection_path());
    assert!(store.load_selection().unwrap().is_none());
}
