//! Environment configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AgentError;
use crate::Result;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub database_url: Option<String>,
    pub exports_dir: PathBuf,
    pub max_steps: u32,
    pub timeout: Duration,
    pub history_limit: usize,
    pub message_retention: usize,
    pub stream_delay: Duration,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let exports_dir = get("EXPORTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("finlit_exports"));

        let max_steps: u32 = parse_or("AGENT_MAX_STEPS", get("AGENT_MAX_STEPS"), 5)?;
        if max_steps == 0 {
            return Err(AgentError::Config("AGENT_MAX_STEPS must be at least 1".to_string()));
        }

        Ok(Self {
            port,
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            database_url: get("DATABASE_URL").or_else(|| get("POSTGRES_URL")),
            exports_dir,
            max_steps,
            timeout: Duration::from_secs(parse_or("AGENT_TIMEOUT_SECS", get("AGENT_TIMEOUT_SECS"), 30)?),
            history_limit: parse_or("AGENT_HISTORY_LIMIT", get("AGENT_HISTORY_LIMIT"), 10)?,
            message_retention: parse_or("MESSAGE_RETENTION", get("MESSAGE_RETENTION"), 50)?,
            stream_delay: Duration::from_millis(parse_or("STREAM_DELAY_MS", get("STREAM_DELAY_MS"), 10)?),
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| AgentError::Config(format!("{} has an invalid value: {:?}", key, raw)))
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert!(config.gemini_api_key.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.message_retention, 50);
        assert_eq!(config.stream_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_overrides_and_fallback_keys() {
        let config = config_from(&[
            ("API_PORT", "9100"),
            ("POSTGRES_URL", "postgres://localhost/finlit"),
            ("GEMINI_API_KEY", "  "),
            ("AGENT_MAX_STEPS", "3"),
        ])
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/finlit"));
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.max_steps, 3);
    }

    #[test]
    fn test_malformed_values_fail() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(config_from(&[("AGENT_MAX_STEPS", "0")]).is_err());
        assert!(config_from(&[("STREAM_DELAY_MS", "-1")]).is_err());
    }
}
