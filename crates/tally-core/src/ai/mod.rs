//! Hosted chat model abstraction
//!
//! # Architecture
//!
//! - `ChatBackend` trait: one Messages-style round trip with optional tools
//! - `AnthropicBackend`: the hosted Anthropic Messages API
//! - `MockChatBackend`: scripted responses for tests
//! - `ChatOrchestrator`: the tool-calling loop on top of a backend
//!
//! # Usage
//!
//! ```rust,ignore
//! let backend = AnthropicBackend::new(&config.chat_api_url, key, &config.chat_model, timeout)?;
//! let orchestrator = ChatOrchestrator::new(Box::new(backend), dispatcher)
//!     .with_max_iterations(config.max_iterations);
//!
//! let result = orchestrator
//!     .execute_with_tracking(&system_prompt, "Where can I cut back?", history)
//!     .await?;
//! println!("{}", result.response);
//! ```

pub mod anthropic;
mod mock;
pub mod orchestrator;

pub use anthropic::{
    AnthropicBackend, ContentBlock, Message, MessageContent, MessagesResponse, Tool,
};
pub use mock::{MockChatBackend, RecordedRequest};
pub use orchestrator::{ChatOrchestrator, ChatResult, ToolCallRecord};

use async_trait::async_trait;

use crate::error::Result;

/// A chat model that accepts a conversation and optional tool definitions
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model name, for logs
    fn model(&self) -> &str;

    /// Send one request and return the assistant's reply
    async fn messages(
        &self,
        system: Option<&str>,
        messages: Vec<Message>,
        tools: Option<&[Tool]>,
    ) -> Result<MessagesResponse>;
}
