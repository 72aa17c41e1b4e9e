//! Fast-path classifier
//!
//! Decides whether a message can be answered by a single deterministic tool
//! without involving the language model:
//! - DateTime: "what time is it", "what's today's date"
//! - General: greetings, thanks, help requests, weather small talk
//!
//! Keywords match case-insensitively on word boundaries, so "hi" does not
//! fire inside "this" or "high".

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPath {
    DateTime,
    General,
}

impl FastPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateTime => "fast_path_datetime",
            Self::General => "fast_path_general",
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::DateTime => "get_current_datetime",
            Self::General => "get_general_info",
        }
    }

    pub fn tool_arguments(&self, message: &str) -> Value {
        match self {
            Self::DateTime => json!({ "timezone": "UTC" }),
            Self::General => json!({ "topic": message }),
        }
    }
}

/// Static keyword lists, zero allocation
const DATETIME_KEYWORDS: &[&str] = &["date", "time", "today", "what day", "what time"];

const GENERAL_KEYWORDS: &[&str] = &["hello", "hi", "help", "thanks", "thank you", "weather"];

/// Immutable keyword configuration, built once and shared by the agent.
#[derive(Debug, Clone)]
pub struct FastPathRules {
    datetime: Vec<String>,
    general: Vec<String>,
}

impl Default for FastPathRules {
    fn default() -> Self {
        Self::new(DATETIME_KEYWORDS, GENERAL_KEYWORDS)
    }
}

impl FastPathRules {
    pub fn new(datetime: &[&str], general: &[&str]) -> Self {
        let normalize = |list: &[&str]| list.iter().map(|k| k.to_lowercase()).collect();
        Self {
            datetime: normalize(datetime),
            general: normalize(general),
        }
    }

    /// Rules that never match (every message goes to the reasoning loop).
    pub fn disabled() -> Self {
        Self::new(&[], &[])
    }

    /// Date/time wins over general when both match.
    pub fn classify(&self, message: &str) -> Option<FastPath> {
        let text = message.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        if self.datetime.iter().any(|k| contains_phrase(&text, k)) {
            Some(FastPath::DateTime)
        } else if self.general.iter().any(|k| contains_phrase(&text, k)) {
            Some(FastPath::General)
        } else {
            None
        }
    }
}

/// `phrase` occurs in `text` with no alphanumeric character on either side.
pub(crate) fn contains_phrase(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    text.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[end..].chars().next().map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_questions() {
        let rules = FastPathRules::default();
        let cases = vec!["what time is it", "What's today's date?", "WHAT DAY is it"];

        for c in cases {
            assert_eq!(rules.classify(c), Some(FastPath::DateTime), "{}", c);
        }
    }

    #[test]
    fn test_general_small_talk() {
        let rules = FastPathRules::default();
        let cases = vec!["hi", "Hello there!", "thanks a lot", "how's the weather"];

        for c in cases {
            assert_eq!(rules.classify(c), Some(FastPath::General), "{}", c);
        }
    }

    #[test]
    fn test_financial_questions_go_to_reasoning() {
        let rules = FastPathRules::default();
        let cases = vec![
            "this is a high interest loan",
            "should I pay off my card or invest?",
            "I have 5000 in updates to my savings",
        ];

        for c in cases {
            assert_eq!(rules.classify(c), None, "{}", c);
        }
    }

    #[test]
    fn test_disabled_rules_never_match() {
        assert_eq!(FastPathRules::disabled().classify("what time is it"), None);
    }

    #[test]
    fn test_tool_arguments() {
        assert_eq!(FastPath::DateTime.tool_arguments("x"), json!({"timezone": "UTC"}));
        assert_eq!(FastPath::General.tool_arguments("hi"), json!({"topic": "hi"}));
    }
}
