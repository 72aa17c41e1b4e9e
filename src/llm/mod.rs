//! Language model backends
//!
//! The agent only needs two capabilities: a tool-aware completion call and
//! a raw text stream (used for single-field extraction).

pub mod gemini;
pub mod scripted;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

use crate::tools::ToolDescriptor;
use crate::Result;

pub use gemini::GeminiBackend;
pub use scripted::ScriptedModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub prompt: String,
    /// Earlier turns, oldest first.
    pub history: Vec<ChatTurn>,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Value,
}

/// One model reply: an answer, tool calls, or both.
///
/// When both are present the tools still run, and the answer ends the turn afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub answer: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            answer: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            answer: None,
            tool_calls: vec![ToolCallRequest {
                name: name.into(),
                arguments,
            }],
        }
    }

    pub fn with_answer(mut self, text: impl Into<String>) -> Self {
        self.answer = Some(text.into());
        self
    }

    /// Answer text, if any, ignoring whitespace-only replies.
    pub fn answer_text(&self) -> Option<&str> {
        self.answer.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Delta(String),
    Done,
}

pub type TextStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

#[async_trait::async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse>;

    async fn stream(&self, prompt: &str, system_prompt: &str) -> Result<TextStream>;
}

/// Drain a text stream into one string, stopping at `Done`.
pub async fn collect_text(mut stream: TextStream) -> Result<String> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Delta(delta) => text.push_str(&delta),
            StreamEvent::Done => break,
        }
    }
    Ok(text)
}
