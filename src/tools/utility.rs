//! Non-financial helper tools: current date/time and canned topic answers

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::Tool;
use crate::classifier::contains_phrase;
use crate::clock::Clock;
use crate::Result;

// ===== Current date and time =====

#[derive(Debug, Deserialize)]
pub struct DateTimeInput {
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateTimeOutput {
    pub current_date: String,
    pub current_time: String,
    pub day_of_week: String,
    pub timezone: String,
}

impl DateTimeOutput {
    /// Conversational rendering used by the date/time shortcut.
    pub fn reply(&self) -> String {
        format!(
            "Today is {}, {} at {} {}.",
            self.day_of_week, self.current_date, self.current_time, self.timezone
        )
    }
}

pub struct CurrentDateTimeTool {
    clock: Arc<dyn Clock>,
}

impl CurrentDateTimeTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait::async_trait]
impl Tool for CurrentDateTimeTool {
    type Input = DateTimeInput;
    type Output = DateTimeOutput;

    fn name(&self) -> &'static str {
        "get_current_datetime"
    }

    fn description(&self) -> &'static str {
        "Get the current date, time and day of the week."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timezone": {"type": "string", "description": "Only UTC is supported"}
            }
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["current_date", "current_time", "day_of_week", "timezone"]
        })
    }

    async fn run(&self, input: DateTimeInput) -> Result<DateTimeOutput> {
        if !input.timezone.eq_ignore_ascii_case("utc") {
            tracing::debug!(requested = %input.timezone, "Unsupported timezone, answering in UTC");
        }
        let now = self.clock.now();
        Ok(DateTimeOutput {
            current_date: now.format("%Y-%m-%d").to_string(),
            current_time: now.format("%H:%M:%S").to_string(),
            day_of_week: now.format("%A").to_string(),
            timezone: "UTC".to_string(),
        })
    }
}

// ===== General information =====

/// Ordered (key, answer) pairs; earlier keys win partial matches.
const GENERAL_TOPICS: &[(&str, &str)] = &[
    ("date", "I can provide the current date and time. Would you like me to get that information for you?"),
    ("time", "I can provide the current date and time. Would you like me to get that information for you?"),
    ("today", "I can provide the current date and time. Would you like me to get that information for you?"),
    ("weather", "I don't have access to real-time weather information, but I can help you with financial planning questions!"),
    ("help", "I'm here to help with financial literacy topics like budgeting, saving, debt management, and investing. What would you like to know?"),
    ("hello", "Hello! I'm your financial literacy assistant. How can I help you today?"),
    ("hi", "Hi there! I'm here to help with your financial questions. What would you like to know?"),
    ("thanks", "You're welcome! I'm happy to help with your financial literacy journey."),
    ("thank you", "You're welcome! I'm happy to help with your financial literacy journey."),
];

const GENERAL_FALLBACK: &str = "I'm a financial literacy assistant. I can help with budgeting, saving, debt management, and investing questions. What would you like to know?";

#[derive(Debug, Deserialize)]
pub struct GeneralInfoInput {
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralInfoOutput {
    pub topic: String,
    pub information: String,
}

/// Exact key match first, then the first key contained in the topic (or vice versa).
pub fn lookup_general_topic(topic: &str) -> &'static str {
    let topic = topic.trim().to_lowercase();

    if let Some((_, answer)) = GENERAL_TOPICS.iter().find(|(key, _)| *key == topic) {
        return answer;
    }

    GENERAL_TOPICS
        .iter()
        .find(|(key, _)| contains_phrase(&topic, key))
        .map(|(_, answer)| *answer)
        .unwrap_or(GENERAL_FALLBACK)
}

pub struct GeneralInfoTool;

#[async_trait::async_trait]
impl Tool for GeneralInfoTool {
    type Input = GeneralInfoInput;
    type Output = GeneralInfoOutput;

    fn name(&self) -> &'static str {
        "get_general_info"
    }

    fn description(&self) -> &'static str {
        "Answer greetings, thanks, help requests and other non-financial small talk."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {"type": "string"}
            },
            "required": ["topic"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["topic", "information"]
        })
    }

    async fn run(&self, input: GeneralInfoInput) -> Result<GeneralInfoOutput> {
        Ok(GeneralInfoOutput {
            information: lookup_general_topic(&input.topic).to_string(),
            topic: input.topic,
        })
    }
}
