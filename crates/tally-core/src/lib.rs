//! Tally Core Library
//!
//! Shared functionality for the Tally budgeting assistant:
//! - Transaction analysis and savings-opportunity heuristics
//! - Budgeting API client fronted by an on-disk cache
//! - Hosted chat model client and the tool-calling loop
//! - Tool dispatcher for the operations the model may request
//! - Plain-text reports
//! - Persisted user context and budget selection
//! - Layered configuration (defaults, TOML file, environment)

pub mod ai;
pub mod analysis;
pub mod budget;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod report;
pub mod store;
pub mod tools;

/// Mock budgeting and chat API servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AnthropicBackend, ChatBackend, ChatOrchestrator, ChatResult, Message, MockChatBackend,
    ToolCallRecord,
};
pub use analysis::{analyze, Analyzer, FinancialInsights, SavingsDetector};
pub use budget::{BudgetSource, TransactionService, YnabClient};
pub use cache::TransactionCache;
pub use config::Config;
pub use context::{build_system_prompt, InsightsSummary};
pub use error::{Error, Result};
pub use models::{Budget, ClearedStatus, FilterConfig, Transaction};
pub use report::{format_currency, render_report, ReportKind};
pub use store::{BudgetSelection, Store, UserContext};
pub use tools::{assistant_tools, ToolCall, ToolDispatcher, ToolOutcome};
