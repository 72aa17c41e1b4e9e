//! Single-field extraction through the language model
//!
//! Used only when the pattern matchers leave a field the current request
//! needs (e.g. a budget sheet without income) empty.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::{FinancialProfile, ProfileUpdate};
use crate::llm::{collect_text, ModelBackend};

/// Messages that ask for a budget artifact.
const SHEET_INTENT_KEYWORDS: &[&str] = &["sheet", "excel", "spreadsheet", "workbook", "budget"];

pub const INCOME_FIELD: &str = "monthly income";
pub const EXPENSES_FIELD: &str = "total monthly expenses";

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract a single numeric value from a user's message. Reply with JSON only.";

pub fn has_sheet_intent(text: &str) -> bool {
    let lower = text.to_lowercase();
    SHEET_INTENT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Ask the model for one numeric field; any failure counts as "not found".
pub async fn extract_field_with_model(model: &dyn ModelBackend, text: &str, field: &str) -> Option<f64> {
    let prompt = format!(
        "From the message below, extract the user's {field} as a plain number.\n\
         Return ONLY a JSON object of the form {{\"value\": number}} or {{\"value\": null}} if it is not stated.\n\n\
         Message: \"{text}\""
    );

    let stream = match model.stream(&prompt, EXTRACTION_SYSTEM_PROMPT).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(field, error = %e, "Field extraction request failed");
            return None;
        }
    };

    match collect_text(stream).await {
        Ok(reply) => {
            let value = parse_extraction_response(&reply);
            debug!(field, ?value, "Field extraction reply parsed");
            value
        }
        Err(e) => {
            warn!(field, error = %e, "Field extraction stream failed");
            None
        }
    }
}

/// Accepts `{"value": <number|null>}`, optionally wrapped in a code fence.
pub fn parse_extraction_response(reply: &str) -> Option<f64> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let parsed: Value = serde_json::from_str(body).ok()?;
    match parsed.get("value")? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
        _ => None,
    }
}

/// Fill income and/or expenses from the model when a budget-sheet request left them empty.
///
/// Returns true when the profile changed.
pub async fn fill_missing_for_sheet(
    model: &dyn ModelBackend,
    profile: &mut FinancialProfile,
    text: &str,
    now: DateTime<Utc>,
) -> bool {
    if !has_sheet_intent(text) {
        return false;
    }

    let mut changed = false;

    if profile.income.total() <= 0.0 {
        if let Some(amount) = extract_field_with_model(model, text, INCOME_FIELD).await {
            changed |= profile.apply(
                ProfileUpdate::IncomeSource {
                    source: "primary".to_string(),
                    amount,
                },
                now,
            );
        }
    }

    if profile.expenses.recurring.is_empty() {
        if let Some(amount) = extract_field_with_model(model, text, EXPENSES_FIELD).await {
            changed |= profile.apply(
                ProfileUpdate::RecurringExpense {
                    category: "general".to_string(),
                    amount,
                },
                now,
            );
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    #[test]
    fn test_parse_plain_and_fenced() {
        assert_eq!(parse_extraction_response("{\"value\": 5200}"), Some(5200.0));
        assert_eq!(parse_extraction_response("```json\n{\"value\": 1800.5}\n```"), Some(1800.5));
        assert_eq!(parse_extraction_response("{\"value\": null}"), None);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(parse_extraction_response("{\"value\": \"5200\"}"), None);
        assert_eq!(parse_extraction_response("about 5200 dollars"), None);
        assert_eq!(parse_extraction_response("{\"amount\": 5200}"), None);
        assert_eq!(parse_extraction_response("{\"value\": -4}"), None);
    }

    #[test]
    fn test_sheet_intent() {
        assert!(has_sheet_intent("Can you make me an Excel budget?"));
        assert!(!has_sheet_intent("how do I pay off my car"));
    }

    #[tokio::test]
    async fn test_fill_missing_only_for_sheet_requests() {
        let model = ScriptedModel::new(Vec::new()).with_stream_reply("{\"value\": 2400}");
        let now = Utc::now();
        let mut profile = FinancialProfile::new(now);

        assert!(!fill_missing_for_sheet(&model, &mut profile, "hello there", now).await);
        assert_eq!(model.call_count(), 0);

        assert!(fill_missing_for_sheet(&model, &mut profile, "make me a budget sheet", now).await);
        assert_eq!(profile.income.total(), 2400.0);
        assert_eq!(profile.expenses.recurring.get("general"), Some(&2400.0));
    }

    #[tokio::test]
    async fn test_model_failure_is_not_found() {
        let model = ScriptedModel::failing("offline");
        assert_eq!(extract_field_with_model(&model, "budget please", INCOME_FIELD).await, None);
    }
}
