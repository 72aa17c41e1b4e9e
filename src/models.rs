//! Core conversation data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::profile::FinancialProfile;

/// Oldest messages beyond this count are dropped from a conversation.
pub const DEFAULT_MESSAGE_RETENTION: usize = 50;

//
// ================= Identifiers =================
//

/// Conversation key. Always a UUID: it is the primary key of the
/// `conversations` table and the value of the `x-conversation-id` header.
/// Prefixed or opaque tokens such as `conv_<uuid>` do not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

//
// ================= Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    ToolCall,
    ToolResult,
    Clarification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: ConversationId,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
}

impl Message {
    pub fn new(
        conversation_id: ConversationId,
        sender: Sender,
        content: impl Into<String>,
        message_type: MessageType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender,
            content: content.into(),
            timestamp,
            message_type,
        }
    }

    pub fn role_label(&self) -> &'static str {
        match self.sender {
            Sender::User => "User",
            Sender::Bot => "Bot",
            Sender::System => "System",
        }
    }
}

//
// ================= Tool call audit =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Success,
    Error,
}

impl ToolCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "success" => Self::Success,
            "error" => Self::Error,
            _ => Self::Pending,
        }
    }
}

/// Audit row for a single tool invocation. Finalized exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: Uuid,
    pub conversation_id: ConversationId,
    pub tool_name: String,
    pub parameters: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub status: ToolCallStatus,
    pub execution_time_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ToolCallRecord {
    pub fn pending(
        conversation_id: ConversationId,
        tool_name: impl Into<String>,
        parameters: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            tool_name: tool_name.into(),
            parameters,
            result: None,
            status: ToolCallStatus::Pending,
            execution_time_seconds: None,
            error_message: None,
            created_at,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status != ToolCallStatus::Pending
    }

    /// Returns false when the record was already finalized.
    pub fn succeed(&mut self, result: serde_json::Value, elapsed_seconds: f64) -> bool {
        if self.is_finalized() {
            return false;
        }
        self.status = ToolCallStatus::Success;
        self.result = Some(result);
        self.execution_time_seconds = Some(elapsed_seconds);
        true
    }

    /// Returns false when the record was already finalized.
    pub fn fail(&mut self, message: impl Into<String>, elapsed_seconds: f64) -> bool {
        if self.is_finalized() {
            return false;
        }
        self.status = ToolCallStatus::Error;
        self.error_message = Some(message.into());
        self.execution_time_seconds = Some(elapsed_seconds);
        true
    }
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub turns: u64,
    pub last_route: Option<String>,
    pub last_steps: u32,
    pub last_prompt_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub title: String,
    pub user_name: String,
    pub messages: Vec<Message>,
    pub financial_profile: FinancialProfile,
    #[serde(default)]
    pub metadata: AgentMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(id: ConversationId, user_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: "New conversation".to_string(),
            user_name: user_name.into(),
            messages: Vec::new(),
            financial_profile: FinancialProfile::new(now),
            metadata: AgentMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message, dropping the oldest ones beyond `retention`.
    pub fn push_message(&mut self, message: Message, retention: usize) {
        if self.messages.is_empty() && message.sender == Sender::User {
            self.title = title_from(&message.content);
        }
        self.updated_at = message.timestamp;
        self.messages.push(message);

        let retention = retention.max(1);
        if self.messages.len() > retention {
            let excess = self.messages.len() - retention;
            self.messages.drain(..excess);
        }
    }

    /// The last `limit` messages, oldest first.
    pub fn recent_messages(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.sender == Sender::User)
    }
}

fn title_from(content: &str) -> String {
    let trimmed = content.trim();
    let title: String = trimmed.chars().take(40).collect();
    if trimmed.chars().count() > 40 {
        format!("{}...", title)
    } else {
        title
    }
}

/// Row returned by conversation listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub financial_profile: FinancialProfile,
}

impl From<&ConversationRecord> for ConversationSummary {
    fn from(record: &ConversationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            message_count: record.messages.len(),
            financial_profile: record.financial_profile.clone(),
        }
    }
}
