//! Test utilities for tally-core
//!
//! Mock budgeting and chat API servers on an ephemeral port, for unit and
//! integration tests (enable the `test-utils` feature from other crates).

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{Json, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::budget::since_date;

/// Token accepted by `MockBudgetServer`
pub const MOCK_BUDGET_TOKEN: &str = "good-token";

/// API key accepted by `MockChatServer`
pub const MOCK_CHAT_KEY: &str = "test-key";

/// Serve `app` on 127.0.0.1 until the returned sender fires or drops
async fn spawn(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

// =============================================================================
// Budgeting API
// =============================================================================

/// Mock budgeting API
///
/// Serves two budgets. `budget-1` ("Household") has three months of
/// transactions dated relative to today: a monthly streaming subscription,
/// rent, groceries, salary, twelve coffee purchases, a card payment transfer
/// and one deleted transaction. `budget-2` ("Side Project") is empty.
pub struct MockBudgetServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockBudgetServer {
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/budgets", get(handle_budgets))
            .route("/budgets/:budget_id/transactions", get(handle_transactions));
        let (addr, shutdown_tx) = spawn(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockBudgetServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", MOCK_BUDGET_TOKEN))
}

fn api_error(status: StatusCode, id: &str, detail: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "id": id, "name": id, "detail": detail } })),
    )
        .into_response()
}

async fn handle_budgets(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return api_error(StatusCode::UNAUTHORIZED, "401", "Unauthorized");
    }
    Json(json!({
        "data": {
            "budgets": [
                { "id": "budget-1", "name": "Household", "last_modified_on": "2024-05-01T12:00:00Z" },
                { "id": "budget-2", "name": "Side Project" }
            ]
        }
    }))
    .into_response()
}

async fn handle_transactions(
    headers: HeaderMap,
    Path(budget_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return api_error(StatusCode::UNAUTHORIZED, "401", "Unauthorized");
    }

    let transactions = match budget_id.as_str() {
        "budget-1" => household_transactions(chrono::Local::now().date_naive()),
        "budget-2" => Vec::new(),
        _ => return api_error(StatusCode::NOT_FOUND, "404", "Budget not found"),
    };

    let since = query
        .get("since_date")
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
    let transactions: Vec<Value> = transactions
        .into_iter()
        .filter(|tx| {
            let date = tx["date"]
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            match (since, date) {
                (Some(since), Some(date)) => date >= since,
                _ => true,
            }
        })
        .collect();

    Json(json!({ "data": { "transactions": transactions, "server_knowledge": 1 } })).into_response()
}

fn api_transaction(
    id: String,
    date: NaiveDate,
    milliunits: i64,
    payee: Option<&str>,
    category: Option<&str>,
) -> Value {
    json!({
        "id": id,
        "date": date.format("%Y-%m-%d").to_string(),
        "amount": milliunits,
        "memo": null,
        "cleared": "cleared",
        "approved": true,
        "account_id": "acct-checking",
        "account_name": "Checking",
        "payee_name": payee,
        "category_name": category,
        "deleted": false
    })
}

/// Household fixture, anchored to the first day of each of the last three months
fn household_transactions(today: NaiveDate) -> Vec<Value> {
    let month_start = |back: u32| since_date(today, back + 1);
    let day = |start: NaiveDate, offset: u64| start + Days::new(offset);

    let mut txs = Vec::new();
    for back in 0..3u32 {
        let start = month_start(back);
        txs.push(api_transaction(
            format!("stream-{}", back),
            start,
            -9_990,
            Some("StreamCo"),
            Some("Subscriptions"),
        ));
        txs.push(api_transaction(
            format!("rent-{}", back),
            day(start, 2),
            -1_250_000,
            None,
            Some("Rent"),
        ));
        txs.push(api_transaction(
            format!("salary-{}", back),
            day(start, 14),
            4_200_000,
            Some("Acme Corp"),
            Some("Inflow: Ready to Assign"),
        ));
    }

    for (i, amount) in [-82_150, -64_300, -91_020].into_iter().enumerate() {
        txs.push(api_transaction(
            format!("grocery-{}", i),
            day(month_start(i as u32), 6),
            amount,
            Some("Fresh Market"),
            Some("Groceries"),
        ));
    }

    for i in 0..12u64 {
        let amount = if i % 2 == 0 { -4_500 } else { -6_500 };
        txs.push(api_transaction(
            format!("coffee-{}", i),
            day(month_start(0), i),
            amount,
            Some("Corner Coffee"),
            Some("Coffee Shops"),
        ));
    }

    txs.push(api_transaction(
        "card-payment".into(),
        day(month_start(1), 20),
        -300_000,
        Some("Transfer : Visa"),
        None,
    ));

    let mut deleted = api_transaction(
        "deleted-1".into(),
        day(month_start(0), 3),
        -20_000,
        Some("Old Charge"),
        Some("Shopping"),
    );
    deleted["deleted"] = json!(true);
    txs.push(deleted);

    txs
}

// =============================================================================
// Chat API
// =============================================================================

/// Mock Anthropic Messages API
///
/// Replies "Mock reply: <question>" to plain questions. A question containing
/// "clear the cache" gets a `clear_cache` tool call; the follow-up turn
/// carrying tool results gets "Done: <first result>".
pub struct MockChatServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockChatServer {
    pub async fn start() -> Self {
        let app = Router::new().route("/v1/messages", post(handle_messages));
        let (addr, shutdown_tx) = spawn(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn chat_response(model: &str, content: Value, stop_reason: &str) -> Response {
    Json(json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "content": content,
        "model": model,
        "stop_reason": stop_reason,
        "stop_sequence": null,
        "usage": { "input_tokens": 10, "output_tokens": 10 }
    }))
    .into_response()
}

async fn handle_messages(headers: HeaderMap, Json(request): Json<Value>) -> Response {
    let key_ok = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == MOCK_CHAT_KEY);
    if !key_ok {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "type": "error",
                "error": { "type": "authentication_error", "message": "invalid x-api-key" }
            })),
        )
            .into_response();
    }

    let model = request["model"].as_str().unwrap_or("mock").to_string();
    let last = request["messages"]
        .as_array()
        .and_then(|m| m.last())
        .cloned()
        .unwrap_or(Value::Null);

    // Follow-up turn carrying tool results
    if let Some(blocks) = last["content"].as_array() {
        let result = blocks
            .iter()
            .find(|b| b["type"] == "tool_result")
            .and_then(|b| b["content"].as_str())
            .unwrap_or("");
        return chat_response(
            &model,
            json!([{ "type": "text", "text": format!("Done: {}", result) }]),
            "end_turn",
        );
    }

    let question = last["content"].as_str().unwrap_or("");
    if question.to_lowercase().contains("clear the cache") {
        return chat_response(
            &model,
            json!([
                { "type": "text", "text": "Clearing the cache." },
                { "type": "tool_use", "id": "toolu_mock_1", "name": "clear_cache", "input": {} }
            ]),
            "tool_use",
        );
    }

    chat_response(
        &model,
        json!([{ "type": "text", "text": format!("Mock reply: {}", question) }]),
        "end_turn",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_household_fixture_shape() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let txs = household_transactions(today);

        assert_eq!(txs.iter().filter(|t| t["deleted"] == true).count(), 1);
        assert_eq!(
            txs.iter().filter(|t| t["payee_name"] == "Corner Coffee").count(),
            12
        );
        assert!(txs
            .iter()
            .all(|t| t["date"].as_str().unwrap() >= "2024-01-01"));
    }

    #[tokio::test]
    async fn test_budget_server_requires_token() {
        let server = MockBudgetServer::start().await;
        let response = reqwest::get(format!("{}/budgets", server.url())).await.unwrap();
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn test_chat_server_echoes_question() {
        let server = MockChatServer::start().await;
        let body: Value = reqwest::Client::new()
            .post(format!("{}/v1/messages", server.url()))
            .header("x-api-key", MOCK_CHAT_KEY)
            .json(&json!({ "model": "m", "messages": [{ "role": "user", "content": "Hi" }] }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["content"][0]["text"], "Mock reply: Hi");
    }
}
