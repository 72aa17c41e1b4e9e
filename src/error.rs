//! Error types for the financial literacy agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Input & Tool Errors
    // =============================

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool_name}: {message}")]
    InvalidArguments { tool_name: String, message: String },

    #[error("Tool {tool_name} failed: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid tool schema for {tool_name}: {message}")]
    InvalidToolSchema { tool_name: String, message: String },

    // =============================
    // Collaborator Errors
    // =============================

    #[error("Model backend error: {0}")]
    ModelBackend(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Knowledge retrieval error: {0}")]
    Knowledge(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn invalid_arguments(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    pub fn tool_execution(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from the tool layer (and can be fed back to the model).
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_) | Self::InvalidArguments { .. } | Self::ToolExecution { .. }
        )
    }

    /// Human-readable sentence for the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::UnknownTool(name) => format!("the tool \"{}\" is not available", name),
            Self::InvalidArguments { tool_name, message } => {
                format!("the inputs for {} were not valid ({})", tool_name, message)
            }
            Self::ToolExecution { tool_name, message } => {
                format!("the {} calculation could not be completed ({})", tool_name, message)
            }
            Self::ModelBackend(msg) => format!("the language model is unavailable ({})", msg),
            Self::Storage(_) | Self::Database(_) => {
                "your conversation could not be saved, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_classification() {
        assert!(AgentError::UnknownTool("x".into()).is_tool_error());
        assert!(AgentError::invalid_arguments("t", "bad").is_tool_error());
        assert!(!AgentError::ModelBackend("down".into()).is_tool_error());
    }

    #[test]
    fn test_user_message_hides_storage_details() {
        let err = AgentError::Storage("connection reset by peer".into());
        assert!(!err.user_message().contains("peer"));
    }
}
