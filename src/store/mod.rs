//! Conversation persistence
//!
//! Whole-record storage of conversations (transcript, profile, metadata)
//! plus the tool-call audit trail, addressed by conversation id.

pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{ConversationId, ConversationRecord, ConversationSummary, ToolCallRecord};
use crate::Result;

pub use memory::InMemoryConversationStore;
pub use postgres::PostgresConversationStore;

#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn load(&self, id: ConversationId) -> Result<Option<ConversationRecord>>;

    /// Replace the stored record (last write wins).
    async fn save(&self, record: &ConversationRecord) -> Result<()>;

    /// Remove a conversation and its tool-call records. Returns false if it did not exist.
    async fn delete(&self, id: ConversationId) -> Result<bool>;

    /// Most recently updated first.
    async fn list(&self) -> Result<Vec<ConversationSummary>>;

    /// Insert or finalize a tool-call record. Finalized records cannot be overwritten.
    async fn save_tool_call(&self, record: &ToolCallRecord) -> Result<()>;

    /// Ordered by creation time.
    async fn tool_calls(&self, id: ConversationId) -> Result<Vec<ToolCallRecord>>;

    /// Stored record for `id`, or a fresh (unsaved) one.
    async fn load_or_create(
        &self,
        id: Option<ConversationId>,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> Result<ConversationRecord> {
        if let Some(id) = id {
            if let Some(record) = self.load(id).await? {
                return Ok(record);
            }
            return Ok(ConversationRecord::new(id, user_name, now));
        }
        Ok(ConversationRecord::new(ConversationId::new(), user_name, now))
    }
}

/// Postgres when a database URL is configured and reachable by the pool builder, in-memory otherwise.
pub fn build_store(database_url: Option<&str>) -> Arc<dyn ConversationStore> {
    if let Some(url) = database_url {
        match PostgresConversationStore::connect_lazy(url) {
            Ok(store) => {
                info!("Conversation store backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres conversation store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Conversation store backend: in-memory");
    Arc::new(InMemoryConversationStore::new())
}
