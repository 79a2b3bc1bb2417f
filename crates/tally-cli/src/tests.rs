//! CLI command tests
//!
//! Commands run against the mock budgeting and chat servers from
//! `tally_core::test_utils`, with a temporary data directory.

use std::time::Duration;

use chrono::NaiveDate;
use tally_core::test_utils::{MockBudgetServer, MockChatServer, MOCK_BUDGET_TOKEN, MOCK_CHAT_KEY};
use tally_core::tools::{ListTransactionsParams, TransactionSummary};
use tally_core::{BudgetSelection, Config, ReportKind};

use crate::commands::{self, truncate, ContextUpdate};

fn test_config(budget_url: &str, dir: &std::path::Path) -> Config {
    Config {
        budget_api_url: budget_url.to_string(),
        budget_token: Some(MOCK_BUDGET_TOKEN.to_string()),
        data_dir: dir.to_path_buf(),
        http_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn select_household(config: &Config) {
    commands::open_store(config)
        .save_selection(&BudgetSelection::new("budget-1", "Household"))
        .unwrap();
}

// ========== Helpers ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer payee name", 10), "a much ...");
    assert_eq!(truncate("Café Crème Brûlée", 8), "Café ...");
}

#[test]
fn test_build_filter() {
    let none = commands::build_filter(None, None, vec![], vec![], None).unwrap();
    assert!(none.is_none());

    let from = NaiveDate::from_ymd_opt(2024, 1, 1);
    let to = NaiveDate::from_ymd_opt(2024, 3, 31);
    let filter = commands::build_filter(from, to, vec!["Checking".into()], vec!["Rent".into()], Some(5.0))
        .unwrap()
        .unwrap();
    assert_eq!(filter.start_date, from);
    assert!(filter.accounts.unwrap().contains("Checking"));
    assert!(filter.excluded_categories.unwrap().contains("Rent"));

    assert!(commands::build_filter(to, from, vec![], vec![], None).is_err());
    assert!(commands::build_filter(None, None, vec![], vec![], Some(-1.0)).is_err());
}

#[test]
fn test_context_update_json() {
    let update = ContextUpdate {
        name: Some("Sam".into()),
        savings_target: Some(300.0),
        notes: vec!["Saving for a bike".into()],
        ..Default::default()
    };
    let json = update.to_json();
    assert_eq!(json["profile"]["name"], "Sam");
    assert_eq!(json["goals"]["savings_target"], 300.0);
    assert!(json["goals"].get("focus_areas").is_none());
    assert_eq!(json["notes"][0], "Saving for a bike");

    assert_eq!(ContextUpdate::default().to_json(), serde_json::json!({}));
}

#[test]
fn test_write_csv() {
    let rows = vec![
        TransactionSummary {
            id: "t1".into(),
            date: "2024-01-05".into(),
            payee: Some("Corner Coffee".into()),
            category: "Coffee Shops".into(),
            amount: -4.5,
            account: "Checking".into(),
            memo: None,
        },
        TransactionSummary {
            id: "t2".into(),
            date: "2024-01-06".into(),
            payee: None,
            category: "Uncategorized".into(),
            amount: 10.0,
            account: "Checking".into(),
            memo: Some("refund, partial".into()),
        },
    ];

    let mut out = Vec::new();
    commands::write_csv(&mut out, &rows).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "id,date,payee,category,amount,account,memo");
    assert_eq!(lines[1], "t1,2024-01-05,Corner Coffee,Coffee Shops,-4.5,Checking,");
    assert!(lines[2].ends_with("\"refund, partial\""));
}

// ========== Context Command Tests ==========

#[test]
fn test_cmd_context_set_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9", dir.path());

    assert!(commands::cmd_context_set(&config, &ContextUpdate::default()).is_err());

    let update = ContextUpdate {
        name: Some("Sam".into()),
        household_size: Some(2),
        ..Default::default()
    };
    commands::cmd_context_set(&config, &update).unwrap();
    commands::cmd_context_show(&config).unwrap();

    let saved = commands::open_store(&config).load_context().unwrap();
    assert_eq!(saved.profile.name.as_deref(), Some("Sam"));
    assert_eq!(saved.profile.household_size, Some(2));
}

// ========== Budget Command Tests ==========

#[tokio::test]
async fn test_cmd_budgets_list_and_select() {
    let server = MockBudgetServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), dir.path());

    commands::cmd_budgets_list(&config).await.unwrap();
    commands::cmd_budgets_select(&config, "household").await.unwrap();

    let selected = commands::open_store(&config).load_selection().unwrap().unwrap();
    assert_eq!(selected.id, "budget-1");

    assert!(commands::cmd_budgets_select(&config, "nope").await.is_err());
}

#[tokio::test]
async fn test_commands_require_token() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        budget_token: None,
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let err = commands::cmd_budgets_list(&config).await.unwrap_err();
    assert!(err.to_string().contains("TALLY_BUDGET_TOKEN"));
}

// ========== Data Command Tests ==========

#[tokio::test]
async fn test_commands_require_selection() {
    let server = MockBudgetServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), dir.path());

    let err = commands::cmd_sync(&config, None).await.unwrap_err();
    assert!(err.to_string().contains("No budget selected"));
}

#[tokio::test]
async fn test_cmd_sync_then_cache_clear() {
    let server = MockBudgetServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), dir.path());
    select_household(&config);

    commands::cmd_sync(&config, Some(3)).await.unwrap();
    let cached = std::fs::read_dir(config.cache_dir()).unwrap().count();
    assert_eq!(cached, 1);

    commands::cmd_cache_clear(&config).unwrap();
    let cached = std::fs::read_dir(config.cache_dir()).unwrap().count();
    assert_eq!(cached, 0);
}

#[tokio::test]
async fn test_cmd_analyze_and_reports() {
    let server = MockBudgetServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), dir.path());
    select_household(&config);

    commands::cmd_analyze(&config, None, None, false).await.unwrap();
    commands::cmd_analyze(&config, Some(2), None, true).await.unwrap();
    for kind in ReportKind::all() {
        commands::cmd_report(&config, *kind, None).await.unwrap();
    }
}

#[tokio::test]
async fn test_cmd_transactions() {
    let server = MockBudgetServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), dir.path());
    select_household(&config);

    let params = ListTransactionsParams {
        payee: Some("coffee".into()),
        limit: Some(5),
        ..Default::default()
    };
    commands::cmd_transactions(&config, &params, false).await.unwrap();
    commands::cmd_transactions(&config, &params, true).await.unwrap();

    let bad = ListTransactionsParams {
        min_amount: Some(10.0),
        max_amount: Some(1.0),
        ..Default::default()
    };
    assert!(commands::cmd_transactions(&config, &bad, false).await.is_err());
}

// ========== Chat Command Tests ==========

#[tokio::test]
async fn test_cmd_chat_one_shot() {
    let budget_server = MockBudgetServer::start().await;
    let chat_server = MockChatServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        chat_api_url: chat_server.url(),
        chat_api_key: Some(MOCK_CHAT_KEY.to_string()),
        ..test_config(&budget_server.url(), dir.path())
    };
    select_household(&config);

    let orchestrator = commands::build_orchestrator(&config).unwrap();
    let prompt = commands::current_system_prompt(&orchestrator, &config).await.unwrap();
    assert!(prompt.contains("Current budget: Household"));

    let result = commands::ask(&orchestrator, &config, "How am I doing?", vec![])
        .await
        .unwrap();
    assert_eq!(result.response, "Mock reply: How am I doing?");

    let result = commands::ask(&orchestrator, &config, "Please clear the cache", vec![])
        .await
        .unwrap();
    assert_eq!(result.tool_calls.len(), 1);
    assert!(result.response.starts_with("Done: Cleared"));

    commands::cmd_chat(&config, Some("Hello")).await.unwrap();
}

#[tokio::test]
async fn test_cmd_chat_requires_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9", dir.path());
    let err = commands::cmd_chat(&config, Some("Hi")).await.unwrap_err();
    assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
}
