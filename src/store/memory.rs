//! In-memory conversation store

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ConversationStore;
use crate::error::AgentError;
use crate::models::{ConversationId, ConversationRecord, ConversationSummary, ToolCallRecord};
use crate::Result;

#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<ConversationId, ConversationRecord>>>,
    tool_calls: Arc<RwLock<HashMap<ConversationId, Vec<ToolCallRecord>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn load(&self, id: ConversationId) -> Result<Option<ConversationRecord>> {
        Ok(self.conversations.read().await.get(&id).cloned())
    }

    async fn save(&self, record: &ConversationRecord) -> Result<()> {
        self.conversations
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: ConversationId) -> Result<bool> {
        let removed = self.conversations.write().await.remove(&id).is_some();
        self.tool_calls.write().await.remove(&id);
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>> {
        let locked = self.conversations.read().await;
        let mut summaries: Vec<ConversationSummary> = locked.values().map(ConversationSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn save_tool_call(&self, record: &ToolCallRecord) -> Result<()> {
        let mut locked = self.tool_calls.write().await;
        let calls = locked.entry(record.conversation_id).or_default();

        match calls.iter_mut().find(|c| c.id == record.id) {
            Some(existing) if existing.is_finalized() => Err(AgentError::Storage(format!(
                "tool call {} is already finalized",
                record.id
            ))),
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => {
                calls.push(record.clone());
                Ok(())
            }
        }
    }

    async fn tool_calls(&self, id: ConversationId) -> Result<Vec<ToolCallRecord>> {
        Ok(self
            .tool_calls
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, MessageType, Sender, ToolCallStatus};
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let store = InMemoryConversationStore::new();
        let now = Utc::now();
        let mut record = ConversationRecord::new(ConversationId::new(), "Ana", now);
        record.push_message(
            Message::new(record.id, Sender::User, "hello", MessageType::Text, now),
            50,
        );
        store.save(&record).await.unwrap();

        let loaded = store.load(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.title, "hello");
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        let store = InMemoryConversationStore::new();
        let now = Utc::now();
        let older = ConversationRecord::new(ConversationId::new(), "a", now - Duration::minutes(5));
        let newer = ConversationRecord::new(ConversationId::new(), "b", now);
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn test_tool_call_write_once() {
        let store = InMemoryConversationStore::new();
        let id = ConversationId::new();
        let mut call = ToolCallRecord::pending(id, "calculate_loan_payment", json!({}), Utc::now());
        store.save_tool_call(&call).await.unwrap();

        assert!(call.succeed(json!({"monthly_payment": 106.07}), 0.001));
        store.save_tool_call(&call).await.unwrap();

        let calls = store.tool_calls(id).await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status, ToolCallStatus::Success);

        assert!(store.save_tool_call(&call).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades_tool_calls() {
        let store = InMemoryConversationStore::new();
        let record = ConversationRecord::new(ConversationId::new(), "Ana", Utc::now());
        store.save(&record).await.unwrap();
        store
            .save_tool_call(&ToolCallRecord::pending(record.id, "t", json!({}), Utc::now()))
            .await
            .unwrap();

        assert!(store.delete(record.id).await.unwrap());
        assert!(store.load(record.id).await.unwrap().is_none());
        assert!(store.tool_calls(record.id).await.unwrap().is_empty());
        assert!(!store.delete(record.id).await.unwrap());
    }
}
