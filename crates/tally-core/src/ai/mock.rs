//! Scripted chat backend for tests
//!
//! Replays a fixed queue of responses and records every request it receives,
//! so orchestrator behaviour can be checked without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::anthropic::{ContentBlock, Message, MessagesResponse, Tool};
use super::ChatBackend;

/// A request as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

#[derive(Default)]
pub struct MockChatBackend {
    responses: Mutex<VecDeque<MessagesResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockChatBackend {
    pub fn new(responses: Vec<MessagesResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Final text answer
    pub fn text(text: &str) -> MessagesResponse {
        MessagesResponse::from_blocks(vec![ContentBlock::text(text)])
    }

    /// A single tool call
    pub fn tool_use(id: &str, name: &str, input: serde_json::Value) -> MessagesResponse {
        MessagesResponse::from_blocks(vec![ContentBlock::tool_use(id, name, input)])
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    fn model(&self) -> &str {
        "mock"
    }

    async fn messages(
        &self,
        system: Option<&str>,
        messages: Vec<Message>,
        tools: Option<&[Tool]>,
    ) -> Result<MessagesResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                system: system.map(String::from),
                messages,
                tool_names: tools
                    .map(|t| t.iter().map(|tool| tool.name.clone()).collect())
                    .unwrap_or_default(),
            });
        }

        self.responses
            .lock()
            .map_err(|_| Error::InvalidData("Mock response queue poisoned".into()))?
            .pop_front()
            .ok_or_else(|| Error::InvalidData("Mock chat backend has no scripted response left".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let backend = MockChatBackend::new(vec![
            MockChatBackend::tool_use("t1", "clear_cache", serde_json::json!({})),
            MockChatBackend::text("All done"),
        ]);

        let first = backend
            .messages(Some("sys"), vec![Message::user("Hi")], None)
            .await
            .unwrap();
        assert_eq!(first.tool_uses().len(), 1);

        let second = backend.messages(None, vec![], None).await.unwrap();
        assert_eq!(second.text().as_deref(), Some("All done"));

        assert!(backend.messages(None, vec![], None).await.is_err());

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].system.as_deref(), Some("sys"));
        assert_eq!(backend.remaining(), 0);
    }
}
