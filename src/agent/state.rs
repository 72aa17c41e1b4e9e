//! Per-turn agent state
//!
//! Created at the start of a turn and dropped at its end; never shared
//! between turns.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

use crate::knowledge::KnowledgeSnippet;
use crate::models::ConversationId;

#[derive(Debug, Clone, Serialize)]
pub struct ToolResultEntry {
    pub tool: String,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
}

/// Why the reasoning loop stopped without an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    StepLimit,
    Timeout,
}

#[derive(Debug)]
pub struct AgentState {
    pub conversation_id: ConversationId,
    pub user_message: String,
    pub tool_results: Vec<ToolResultEntry>,
    pub retrieved_chunks: Vec<KnowledgeSnippet>,
    pub current_step: u32,
    pub max_steps: u32,
    pub last_prompt_hash: Option<String>,
    started: Instant,
    timeout: Duration,
}

impl AgentState {
    pub fn new(conversation_id: ConversationId, user_message: impl Into<String>, max_steps: u32, timeout: Duration) -> Self {
        Self {
            conversation_id,
            user_message: user_message.into(),
            tool_results: Vec::new(),
            retrieved_chunks: Vec::new(),
            current_step: 0,
            max_steps,
            last_prompt_hash: None,
            started: Instant::now(),
            timeout,
        }
    }

    pub fn add_tool_result(&mut self, tool: impl Into<String>, result: Value, timestamp: DateTime<Utc>) {
        self.tool_results.push(ToolResultEntry {
            tool: tool.into(),
            result,
            timestamp,
        });
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_timeout(&self) -> bool {
        self.elapsed() > self.timeout
    }

    /// Checked at each step boundary; the step limit takes precedence.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.current_step >= self.max_steps {
            Some(StopReason::StepLimit)
        } else if self.is_timeout() {
            Some(StopReason::Timeout)
        } else {
            None
        }
    }
}
