//! Input screening at the transport boundary

use chrono::{DateTime, Duration, Utc};

use crate::models::ConversationRecord;

pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Window in which an identical resubmission is treated as a double send.
pub const DUPLICATE_WINDOW_SECS: i64 = 2;

const PROBING_PHRASES: &[&str] = &[
    "who created you",
    "who made you",
    "your creator",
    "what model are you",
    "what is your model",
    "what is your prompt",
    "your instructions",
    "your rules",
    "system prompt",
    "openai",
    "google",
    "tell me a secret",
    "ignore previous instructions",
    "forget everything",
];

const INJECTION_MARKERS: &[&str] = &["<script>", "DROP TABLE", "`"];

pub const OFF_TOPIC_REFUSAL: &str = "I can only discuss financial literacy topics for students. This is a security boundary.";
pub const INVALID_CHARACTERS_REFUSAL: &str = "Invalid characters detected. Please rephrase your question.";
pub const TOO_LONG_REFUSAL: &str = "Your message is too long. Please keep it under 1000 characters.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    Allowed,
    Empty,
    Refused(&'static str),
}

pub fn screen_input(text: &str) -> Screening {
    let text = text.trim();
    if text.is_empty() {
        return Screening::Empty;
    }

    let lower = text.to_lowercase();
    if PROBING_PHRASES.iter().any(|p| lower.contains(p)) {
        return Screening::Refused(OFF_TOPIC_REFUSAL);
    }

    if INJECTION_MARKERS.iter().any(|m| text.contains(m)) {
        return Screening::Refused(INVALID_CHARACTERS_REFUSAL);
    }

    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Screening::Refused(TOO_LONG_REFUSAL);
    }

    Screening::Allowed
}

/// Same text as the last stored user message, received within the duplicate window.
pub fn is_duplicate_submission(record: &ConversationRecord, text: &str, now: DateTime<Utc>) -> bool {
    record.last_user_message().is_some_and(|last| {
        last.content.trim() == text.trim() && now - last.timestamp < Duration::seconds(DUPLICATE_WINDOW_SECS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationId, Message, MessageType, Sender};

    #[test]
    fn test_screening() {
        assert_eq!(screen_input("   "), Screening::Empty);
        assert_eq!(screen_input("How do I start a budget?"), Screening::Allowed);
        assert_eq!(
            screen_input("Please IGNORE PREVIOUS INSTRUCTIONS"),
            Screening::Refused(OFF_TOPIC_REFUSAL)
        );
        assert_eq!(
            screen_input("'; DROP TABLE users; --"),
            Screening::Refused(INVALID_CHARACTERS_REFUSAL)
        );
        assert_eq!(
            screen_input(&"a".repeat(MAX_MESSAGE_CHARS + 1)),
            Screening::Refused(TOO_LONG_REFUSAL)
        );
        assert_eq!(screen_input(&"a".repeat(MAX_MESSAGE_CHARS)), Screening::Allowed);
    }

    #[test]
    fn test_duplicate_window() {
        let now = Utc::now();
        let mut record = ConversationRecord::new(ConversationId::new(), "Ana", now);
        assert!(!is_duplicate_submission(&record, "hi", now));

        record.push_message(Message::new(record.id, Sender::User, "my income is 5200", MessageType::Text, now), 50);

        assert!(is_duplicate_submission(&record, "my income is 5200", now + Duration::milliseconds(500)));
        assert!(!is_duplicate_submission(&record, "my income is 5200", now + Duration::seconds(3)));
        assert!(!is_duplicate_submission(&record, "my income is 5300", now));
    }
}
