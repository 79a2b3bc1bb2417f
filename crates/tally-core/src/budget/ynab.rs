//! Budgeting API client
//!
//! Talks to a YNAB-style REST API: bearer-token auth, every payload wrapped
//! in a `{ "data": { ... } }` envelope, amounts in integer milliunits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{milliunits_to_amount, Budget, ClearedStatus, Transaction};

use super::BudgetSource;

/// `{ "data": ... }` wrapper around every response body
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct BudgetsData {
    budgets: Vec<ApiBudget>,
}

#[derive(Debug, Deserialize)]
struct ApiBudget {
    id: String,
    name: String,
    #[serde(default)]
    last_modified_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: Vec<ApiTransaction>,
}

/// Transaction as the API sends it
#[derive(Debug, Deserialize)]
pub struct ApiTransaction {
    pub id: String,
    pub date: NaiveDate,
    /// Milliunits; negative = outflow
    pub amount: i64,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub cleared: Option<String>,
    #[serde(default)]
    pub approved: bool,
    pub account_id: String,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub payee_id: Option<String>,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub transfer_account_id: Option<String>,
    #[serde(default)]
    pub transfer_transaction_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl From<ApiTransaction> for Transaction {
    fn from(api: ApiTransaction) -> Self {
        let cleared = match api.cleared.as_deref() {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(id = %api.id, cleared = raw, "Unknown cleared status");
                ClearedStatus::Uncleared
            }),
            None => ClearedStatus::Uncleared,
        };

        Transaction {
            amount: milliunits_to_amount(api.amount),
            date: api.date,
            memo: api.memo.filter(|m| !m.is_empty()),
            cleared,
            approved: api.approved,
            account_name: api.account_name.unwrap_or_else(|| api.account_id.clone()),
            account_id: api.account_id,
            payee_id: api.payee_id,
            payee_name: api.payee_name.filter(|p| !p.is_empty()),
            category_id: api.category_id,
            category_name: api.category_name.filter(|c| !c.is_empty()),
            transfer_account_id: api.transfer_account_id,
            transfer_transaction_id: api.transfer_transaction_id,
            deleted: api.deleted,
            id: api.id,
        }
    }
}

/// HTTP client for the budgeting API
#[derive(Clone)]
pub struct YnabClient {
    http_client: Client,
    base_url: String,
    token: String,
}

impl YnabClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Budgeting API request");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Auth(
                "Budgeting API rejected the access token".into(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                service: "Budgeting",
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl BudgetSource for YnabClient {
    fn name(&self) -> &str {
        "ynab"
    }

    async fn list_budgets(&self) -> Result<Vec<Budget>> {
        let data: BudgetsData = self.get("/budgets", &[]).await?;
        debug!(count = data.budgets.len(), "Fetched budgets");

        Ok(data
            .budgets
            .into_iter()
            .map(|b| Budget {
                id: b.id,
                name: b.name,
                last_modified_on: b.last_modified_on,
            })
            .collect())
    }

    async fn fetch_transactions(&self, budget_id: &str, since: NaiveDate) -> Result<Vec<Transaction>> {
        let path = format!("/budgets/{}/transactions", budget_id);
        let query = [("since_date", since.format("%Y-%m-%d").to_string())];
        let data: TransactionsData = self.get(&path, &query).await?;

        debug!(
            budget_id,
            since = %since,
            count = data.transactions.len(),
            "Fetched transactions"
        );

        Ok(data.transactions.into_iter().map(Transaction::from).collect())
    }
}
