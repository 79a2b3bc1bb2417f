//! Tool-calling chat loop
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  1. Send system prompt + history + tools to the backend  │
//! │  2. If the reply asks for tools:                         │
//! │     a. Run each through the ToolDispatcher               │
//! │     b. Send the results back                             │
//! │     c. Repeat until a plain answer or max_iterations     │
//! │  3. Return the final text                                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The hosted Messages API always returns `tool_use` blocks. Models behind
//! compatibility servers sometimes write tool calls as XML in their text
//! instead; those are parsed and executed too.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::tools::{assistant_tools, ToolDispatcher, ToolOutcome};

use super::anthropic::{ContentBlock, Message, MessagesResponse, Tool};
use super::ChatBackend;

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<function=([^>]+)>(.*?)</function>").expect("valid function regex")
});
static PARAMETER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<parameter=([^>]+)>([^<]*)</parameter>").expect("valid parameter regex")
});
static TOOL_CALL_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?\s*tool_?call\s*>").expect("valid tool_call tag regex")
});

/// Tool call found in plain text output
#[derive(Debug, Clone, PartialEq)]
struct ParsedToolCall {
    name: String,
    params: serde_json::Value,
}

/// One tool call made during a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: serde_json::Value,
    pub success: bool,
    /// Text returned to the model
    pub output: Option<String>,
}

/// Outcome of one user turn
#[derive(Debug, Clone)]
pub struct ChatResult {
    /// Final assistant text
    pub response: String,
    /// History with this turn appended (text turns only)
    pub messages: Vec<Message>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub iterations: usize,
}

pub struct ChatOrchestrator {
    backend: Box<dyn ChatBackend>,
    dispatcher: ToolDispatcher,
    tools: Vec<Tool>,
    max_iterations: usize,
}

impl ChatOrchestrator {
    pub fn new(backend: Box<dyn ChatBackend>, dispatcher: ToolDispatcher) -> Self {
        Self {
            backend,
            dispatcher,
            tools: assistant_tools(),
            max_iterations: 5,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Run one user turn to completion
    pub async fn execute_with_tracking(
        &self,
        system_prompt: &str,
        user_message: &str,
        prior_messages: Vec<Message>,
    ) -> Result<ChatResult> {
        let history_len = prior_messages.len();
        let mut messages = prior_messages.clone();
        messages.push(Message::user(user_message));

        let mut conversation = prior_messages;
        conversation.push(Message::user(user_message));

        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();

        info!(
            model = %self.backend.model(),
            tools = self.tools.len(),
            history_len,
            "Starting chat turn"
        );

        for iteration in 0..self.max_iterations {
            debug!(iteration, "Chat iteration");

            let response = self
                .backend
                .messages(Some(system_prompt), messages.clone(), Some(&self.tools))
                .await?;

            let tool_uses = response.tool_uses();

            // XML calls can arrive with stop_reason "end_turn"
            let xml_calls = if tool_uses.is_empty() {
                response
                    .text()
                    .map(|text| parse_xml_tool_calls(&text))
                    .unwrap_or_default()
            } else {
                Vec::new()
            };

            if tool_uses.is_empty() && xml_calls.is_empty() {
                info!(iteration, tool_calls = tool_calls.len(), "Chat turn complete");
                let text = extract_text(&response)?;
                conversation.push(Message::assistant(text.clone()));
                return Ok(ChatResult {
                    response: text,
                    messages: conversation,
                    tool_calls,
                    iterations: iteration + 1,
                });
            }

            if !tool_uses.is_empty() {
                debug!(iteration, count = tool_uses.len(), "Executing tool_use blocks");
                messages.push(Message::assistant_blocks(response.content.clone()));

                let mut results = Vec::new();
                for (id, name, input) in tool_uses {
                    let record = self.run_tool(name, input).await;
                    let output = record.output.clone().unwrap_or_default();
                    results.push(if record.success {
                        ContentBlock::tool_result(id, output)
                    } else {
                        ContentBlock::tool_error(id, output)
                    });
                    tool_calls.push(record);
                }
                messages.push(Message::tool_results(results));
            } else {
                info!(iteration, count = xml_calls.len(), "Executing XML-style tool calls");

                let preamble = response
                    .text()
                    .map(|text| strip_xml_tool_calls(&text))
                    .unwrap_or_default();
                if !preamble.is_empty() {
                    messages.push(Message::assistant(&preamble));
                }

                let mut outputs = Vec::new();
                for (i, call) in xml_calls.iter().enumerate() {
                    let record = self.run_tool(&call.name, &call.params).await;
                    let label = if record.success { "result" } else { "error" };
                    outputs.push(format!(
                        "Tool {} ({}) {}:\n{}",
                        i + 1,
                        call.name,
                        label,
                        record.output.as_deref().unwrap_or_default()
                    ));
                    tool_calls.push(record);
                }

                messages.push(Message::user(format!(
                    "Here are the results from the tools you requested:\n\n{}",
                    outputs.join("\n\n")
                )));
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "Chat turn hit max iterations"
        );
        Err(Error::InvalidData(format!(
            "Max iterations ({}) reached without a final answer",
            self.max_iterations
        )))
    }

    /// Run one tool; dispatcher errors are reported back, not raised
    async fn run_tool(&self, name: &str, input: &serde_json::Value) -> ToolCallRecord {
        let outcome = match self.dispatcher.dispatch(name, input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool failed");
                ToolOutcome::failure(format!("Tool {} failed: {}", name, e))
            }
        };
        debug!(tool = name, success = outcome.success, "Tool finished");

        ToolCallRecord {
            name: name.to_string(),
            input: input.clone(),
            success: outcome.success,
            output: Some(outcome.render()),
        }
    }
}

fn extract_text(response: &MessagesResponse) -> Result<String> {
    response
        .text()
        .ok_or_else(|| Error::InvalidData("Chat response contained no text".into()))
}

/// Parse `<function=name><parameter=key>value</parameter></function>` calls
fn parse_xml_tool_calls(text: &str) -> Vec<ParsedToolCall> {
    FUNCTION_RE
        .captures_iter(text)
        .map(|func| {
            let params: serde_json::Map<String, serde_json::Value> = PARAMETER_RE
                .captures_iter(&func[2])
                .map(|param| (param[1].trim().to_string(), coerce_param(param[2].trim())))
                .collect();
            ParsedToolCall {
                name: func[1].trim().to_string(),
                params: serde_json::Value::Object(params),
            }
        })
        .collect()
}

/// Integer, then float, then boolean, else string
fn coerce_param(value: &str) -> serde_json::Value {
    if let Ok(n) = value.parse::<i64>() {
        return serde_json::Value::Number(n.into());
    }
    if let Some(n) = value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
    {
        return serde_json::Value::Number(n);
    }
    match value {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(value.to_string()),
    }
}

/// Text with XML tool calls and stray `<tool_call>` tags removed
fn strip_xml_tool_calls(text: &str) -> String {
    let stripped = FUNCTION_RE.replace_all(text, "");
    TOOL_CALL_TAG_RE.replace_all(&stripped, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockChatBackend;
    use crate::budget::{BudgetSource, TransactionService};
    use crate::cache::TransactionCache;
    use crate::models::{Budget, Transaction};
    use crate::store::{BudgetSelection, Store};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct EmptySource;

    #[async_trait]
    impl BudgetSource for EmptySource {
        fn name(&self) -> &str {
            "empty"
        }

        async fn list_budgets(&self) -> Result<Vec<Budget>> {
            Ok(vec![Budget {
                id: "b-1".into(),
                name: "Household".into(),
                last_modified_on: None,
            }])
        }

        async fn fetch_transactions(
            &self,
            _budget_id: &str,
            _since: NaiveDate,
        ) -> Result<Vec<Transaction>> {
            Err(Error::Auth("token revoked".into()))
        }
    }

    /// Lets a test keep a handle on the mock after handing it to the orchestrator
    struct Shared(Arc<MockChatBackend>);

    #[async_trait]
    impl ChatBackend for Shared {
        fn model(&self) -> &str {
            self.0.model()
        }

        async fn messages(
            &self,
            system: Option<&str>,
            messages: Vec<Message>,
            tools: Option<&[Tool]>,
        ) -> Result<MessagesResponse> {
            self.0.messages(system, messages, tools).await
        }
    }

    fn orchestrator(
        dir: &std::path::Path,
        responses: Vec<MessagesResponse>,
    ) -> (ChatOrchestrator, Arc<MockChatBackend>) {
        let mock = Arc::new(MockChatBackend::new(responses));
        let cache = TransactionCache::new(dir.join("cache"), Duration::from_secs(60));
        let service = TransactionService::new(Box::new(EmptySource), cache);
        let store = Store::in_dir(dir);
        store
            .save_selection(&BudgetSelection::new("b-1", "Household"))
            .unwrap();
        let dispatcher = ToolDispatcher::new(service, store, 3);
        (
            ChatOrchestrator::new(Box::new(Shared(mock.clone())), dispatcher),
            mock,
        )
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mock) = orchestrator(dir.path(), vec![MockChatBackend::text("Hi!")]);

        let result = orchestrator
            .execute_with_tracking("system", "Hello", vec![])
            .await
            .unwrap();
        assert_eq!(result.response, "Hi!");
        assert_eq!(result.iterations, 1);
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.messages.len(), 2);

        let requests = mock.requests();
        assert_eq!(requests[0].system.as_deref(), Some("system"));
        assert_eq!(requests[0].tool_names.len(), 6);
    }

    #[tokio::test]
    async fn test_tool_use_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mock) = orchestrator(
            dir.path(),
            vec![
                MockChatBackend::tool_use("t1", "clear_cache", json!({})),
                MockChatBackend::text("Cache cleared."),
            ],
        );

        let history = vec![Message::user("Earlier"), Message::assistant("Reply")];
        let result = orchestrator
            .execute_with_tracking("system", "Clear it", history)
            .await
            .unwrap();

        assert_eq!(result.response, "Cache cleared.");
        assert_eq!(result.iterations, 2);
        assert_eq!(result.tool_calls.len(), 1);
        assert!(result.tool_calls[0].success);
        // Tool internals stay out of the returned history
        assert_eq!(result.messages.len(), 4);

        let second = &mock.requests()[1];
        match &second.messages.last().unwrap().content {
            crate::ai::MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult {
                    tool_use_id,
                    is_error,
                    ..
                } => {
                    assert_eq!(tool_use_id, "t1");
                    assert!(is_error.is_none());
                }
                other => panic!("Expected tool result, got {:?}", other),
            },
            other => panic!("Expected blocks, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_tools_are_flagged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mock) = orchestrator(
            dir.path(),
            vec![
                MockChatBackend::tool_use("t1", "sync_transactions", json!({})),
                MockChatBackend::tool_use("t2", "no_such_tool", json!({})),
                MockChatBackend::text("Sorry, I could not sync."),
            ],
        );

        let result = orchestrator
            .execute_with_tracking("system", "Sync please", vec![])
            .await
            .unwrap();
        assert_eq!(result.tool_calls.len(), 2);
        assert!(result.tool_calls.iter().all(|c| !c.success));
        assert!(result.tool_calls[0]
            .output
            .as_deref()
            .unwrap()
            .contains("token revoked"));

        let requests = mock.requests();
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert!(matches!(
            &last.content,
            crate::ai::MessageContent::Blocks(blocks)
                if matches!(blocks[0], ContentBlock::ToolResult { is_error: Some(true), .. })
        ));
    }

    #[tokio::test]
    async fn test_xml_tool_calls() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, mock) = orchestrator(
            dir.path(),
            vec![
                MockChatBackend::text(
                    "Let me clear that.\n<function=clear_cache>\n</function>\n</tool_call>",
                ),
                MockChatBackend::text("Done."),
            ],
        );

        let result = orchestrator
            .execute_with_tracking("system", "Clear the cache", vec![])
            .await
            .unwrap();
        assert_eq!(result.response, "Done.");
        assert_eq!(result.tool_calls[0].name, "clear_cache");

        let sent = &mock.requests()[1].messages;
        assert_eq!(sent[1].text().as_deref(), Some("Let me clear that."));
        assert!(sent[2]
            .text()
            .unwrap()
            .starts_with("Here are the results from the tools you requested:"));
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(
            dir.path(),
            vec![
                MockChatBackend::tool_use("t1", "clear_cache", json!({})),
                MockChatBackend::tool_use("t2", "clear_cache", json!({})),
            ],
        );
        let orchestrator = orchestrator.with_max_iterations(2);

        let err = orchestrator
            .execute_with_tracking("system", "Loop", vec![])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Max iterations (2)"));
    }

    #[test]
    fn test_parse_xml_tool_calls() {
        let text = r#"Checking.
<function=list_transactions>
<parameter=payee>Blue Bottle</parameter>
<parameter=limit>10</parameter>
<parameter=min_amount>4.5</parameter>
</function>
<function=analyze_transactions>
<parameter=focus>savings</parameter>
</function>"#;

        let calls = parse_xml_tool_calls(text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "list_transactions");
        assert_eq!(calls[0].params["payee"], "Blue Bottle");
        assert_eq!(calls[0].params["limit"], 10);
        assert_eq!(calls[0].params["min_amount"], 4.5);
        assert_eq!(calls[1].params["focus"], "savings");

        assert!(parse_xml_tool_calls("No tools here").is_empty());
    }

    #[test]
    fn test_coerce_param() {
        assert_eq!(coerce_param("3"), json!(3));
        assert_eq!(coerce_param("2.5"), json!(2.5));
        assert_eq!(coerce_param("true"), json!(true));
        assert_eq!(coerce_param("groceries"), json!("groceries"));
    }

    #[test]
    fn test_strip_xml_tool_calls() {
        let text = "Sure thing.\n<tool_call>\n<function=clear_cache>\n</function>\n</Tool_call>";
        assert_eq!(strip_xml_tool_calls(text), "Sure thing.");
    }

    #[test]
    fn test_xml_patterns_shared_across_responses() {
        let first = "<function=clear_cache>\n</function>";
        let second = "<function=sync_transactions><parameter=months>6</parameter></function>";

        assert_eq!(parse_xml_tool_calls(first)[0].name, "clear_cache");
        let calls = parse_xml_tool_calls(second);
        assert_eq!(calls[0].name, "sync_transactions");
        assert_eq!(calls[0].params["months"], 6);
        assert_eq!(strip_xml_tool_calls(&format!("Ok {}", second)), "Ok");
        assert!(FUNCTION_RE.is_match(first));
    }
}
