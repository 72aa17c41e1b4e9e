//! PostgreSQL conversation store
//!
//! Conversations are stored whole as JSONB (profile and transcript included);
//! tool calls get their own table so the audit trail can be queried directly.

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error};
use uuid::Uuid;

use super::ConversationStore;
use crate::error::AgentError;
use crate::models::{ConversationId, ConversationRecord, ConversationSummary, ToolCallRecord, ToolCallStatus};
use crate::Result;

pub struct PostgresConversationStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresConversationStore {
    /// Build a pool without connecting; the schema is created on first use.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS conversations (
                      id UUID PRIMARY KEY,
                      user_name TEXT NOT NULL,
                      title TEXT NOT NULL,
                      record JSONB NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS tool_calls (
                      id UUID PRIMARY KEY,
                      conversation_id UUID NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                      tool_name TEXT NOT NULL,
                      parameters JSONB NOT NULL,
                      result JSONB,
                      status TEXT NOT NULL,
                      execution_time_seconds DOUBLE PRECISION,
                      error_message TEXT,
                      created_at TIMESTAMPTZ NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_tool_calls_conversation_time
                    ON tool_calls (conversation_id, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| AgentError::Storage(format!("Failed to initialize conversation schema: {}", e)))?;

        Ok(())
    }
}

fn storage_error(context: &str, e: sqlx::Error) -> AgentError {
    error!("{}: {}", context, e);
    AgentError::Storage(format!("{}: {}", context, e))
}

#[async_trait::async_trait]
impl ConversationStore for PostgresConversationStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self, id: ConversationId) -> Result<Option<ConversationRecord>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT record FROM conversations WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load conversation", e))?;

        match row {
            Some(row) => {
                let Json(record): Json<ConversationRecord> = row
                    .try_get("record")
                    .map_err(|e| storage_error("Failed to decode conversation", e))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, record: &ConversationRecord) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_name, title, record, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET user_name = EXCLUDED.user_name,
                title = EXCLUDED.title,
                record = EXCLUDED.record,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.id.0)
        .bind(&record.user_name)
        .bind(&record.title)
        .bind(Json(record))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to save conversation", e))?;

        debug!(conversation_id = %record.id, messages = record.messages.len(), "Conversation saved");
        Ok(())
    }

    async fn delete(&self, id: ConversationId) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to delete conversation", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>> {
        self.ensure_schema().await?;

        let rows = sqlx::query("SELECT record FROM conversations ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to list conversations", e))?;

        rows.iter()
            .map(|row| {
                let Json(record): Json<ConversationRecord> = row
                    .try_get("record")
                    .map_err(|e| storage_error("Failed to decode conversation", e))?;
                Ok(ConversationSummary::from(&record))
            })
            .collect()
    }

    async fn save_tool_call(&self, record: &ToolCallRecord) -> Result<()> {
        self.ensure_schema().await?;

        // The update only applies while the stored row is still pending.
        let result = sqlx::query(
            r#"
            INSERT INTO tool_calls
              (id, conversation_id, tool_name, parameters, result, status, execution_time_seconds, error_message, created_at)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET result = EXCLUDED.result,
                status = EXCLUDED.status,
                execution_time_seconds = EXCLUDED.execution_time_seconds,
                error_message = EXCLUDED.error_message
            WHERE tool_calls.status = 'pending'
            "#,
        )
        .bind(record.id)
        .bind(record.conversation_id.0)
        .bind(&record.tool_name)
        .bind(&record.parameters)
        .bind(&record.result)
        .bind(record.status.as_str())
        .bind(record.execution_time_seconds)
        .bind(&record.error_message)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to save tool call", e))?;

        if result.rows_affected() == 0 {
            return Err(AgentError::Storage(format!(
                "tool call {} is already finalized",
                record.id
            )));
        }
        Ok(())
    }

    async fn tool_calls(&self, id: ConversationId) -> Result<Vec<ToolCallRecord>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, tool_name, parameters, result, status, execution_time_seconds, error_message, created_at
            FROM tool_calls
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to load tool calls", e))?;

        rows.iter()
            .map(|row| {
                let decode = |e| storage_error("Failed to decode tool call", e);
                let status: String = row.try_get("status").map_err(decode)?;
                Ok(ToolCallRecord {
                    id: row.try_get::<Uuid, _>("id").map_err(decode)?,
                    conversation_id: id,
                    tool_name: row.try_get("tool_name").map_err(decode)?,
                    parameters: row.try_get("parameters").map_err(decode)?,
                    result: row.try_get("result").map_err(decode)?,
                    status: ToolCallStatus::parse(&status),
                    execution_time_seconds: row.try_get("execution_time_seconds").map_err(decode)?,
                    error_message: row.try_get("error_message").map_err(decode)?,
                    created_at: row.try_get("created_at").map_err(decode)?,
                })
            })
            .collect()
    }
}
