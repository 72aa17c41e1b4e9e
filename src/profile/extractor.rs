//! Pattern-based extraction of financial facts from free text
//!
//! Matching is case-insensitive. Amounts may carry a `$` prefix and
//! thousands separators. A trailing `k` is not interpreted, so "$60k" is
//! read as 60.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

use super::{FinancialProfile, ProfileUpdate};

const AMOUNT: &str = r"\d[\d,]*(?:\.\d{1,2})?";

const EXPENSE_CATEGORIES: &str = "rent|groceries|food|transportation|utilities|tuition|books|entertainment|gym|insurance|phone|internet|streaming|netflix|spotify";

const DEBT_TYPES: &str = r"student\s+loans?|car\s+loans?|personal\s+loans?|credit\s+cards?|mortgage";

const GOAL_NAME_STOPWORDS: &[&str] = &["my", "a", "an", "the", "our", "your", "this", "that", "savings"];

lazy_static! {
    static ref INCOME_RE: Regex = Regex::new(&format!(
        r"(?i)\b(?:i\s+(?:earn|make)|i'?m\s+(?:earning|making)|i\s+am\s+(?:earning|making)|my\s+(?:monthly\s+)?(?:income|salary|pay)\s+(?:is|of)|income\s+of|salary\s+of)\s+(?:about\s+|around\s+|roughly\s+)?\$?({AMOUNT})"
    ))
    .expect("income pattern");

    static ref EXPENSE_RE: Regex = Regex::new(&format!(
        r"(?i)\b({EXPENSE_CATEGORIES})\b\s*(?:is|are|costs?|of|:|=)?\s*(?:about\s+|around\s+)?\$?({AMOUNT})"
    ))
    .expect("expense pattern");

    static ref EXPENSE_SPEND_RE: Regex = Regex::new(&format!(
        r"(?i)\$?({AMOUNT})\s*(?:(?:a|per)\s+month\s+|monthly\s+)?(?:on|for)\s+(?:my\s+)?({EXPENSE_CATEGORIES})\b"
    ))
    .expect("expense spend pattern");

    static ref DEBT_RE: Regex = Regex::new(&format!(
        r"(?i)\b({DEBT_TYPES})\b[^.!?]*?(?:balance|owe|debt)[^\d.!?]*?\$?({AMOUNT})"
    ))
    .expect("debt pattern");

    static ref DEBT_OWE_RE: Regex = Regex::new(&format!(
        r"(?i)\bowe\s+(?:about\s+|around\s+)?\$?({AMOUNT})\s+(?:on|for|in)\s+(?:my\s+|a\s+)?({DEBT_TYPES})\b"
    ))
    .expect("debt owe pattern");

    static ref GOAL_SAVE_RE: Regex = Regex::new(&format!(
        r"(?i)\bsav(?:e|ing)\s+(?:up\s+)?(?:for|towards?)\s+(?:an?\s+|my\s+|the\s+)?(?:new\s+|used\s+)?([a-z]+(?:\s+fund)?)\b[^\d.!?]*?\$?({AMOUNT})"
    ))
    .expect("goal save pattern");

    static ref GOAL_TARGET_RE: Regex = Regex::new(&format!(
        r"(?i)\b([a-z]+(?:\s+fund)?)\s+goal\s*(?:is|of|:)?\s*(?:about\s+)?\$?({AMOUNT})"
    ))
    .expect("goal target pattern");

    // Labelled totals
    static ref LABEL_FIRST_RE: Regex = Regex::new(&format!(
        r"(?i)\b(income|expenses?|debts?|down\s?payment)\s*(?:is|are|of|will\s+be|:|=)?\s*\$?({AMOUNT})"
    ))
    .expect("label-first pattern");

    static ref AMOUNT_FIRST_RE: Regex = Regex::new(&format!(
        r"(?i)\$?({AMOUNT})k?\s+(?:in\s+)?(?:monthly\s+|total\s+)?(income|expenses?|debts?)\b"
    ))
    .expect("amount-first pattern");

    static ref INCOME_VERB_RE: Regex = Regex::new(&format!(
        r"(?i)\b(?:earn|make|making)\s+\$?({AMOUNT})"
    ))
    .expect("income verb pattern");
}

/// Result of running extraction over one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub new_data_captured: bool,
    pub summary: String,
}

/// Stateless extractor over the built-in patterns.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileExtractor;

impl ProfileExtractor {
    pub fn new() -> Self {
        Self
    }

    /// All profile updates implied by `text`, in a deterministic order.
    pub fn extract(&self, text: &str) -> Vec<ProfileUpdate> {
        let mut updates = Vec::new();

        let mut income_found = false;
        for caps in INCOME_RE.captures_iter(text) {
            if let Some(amount) = amount_at(&caps, 1) {
                updates.push(ProfileUpdate::IncomeSource {
                    source: "primary".to_string(),
                    amount,
                });
                income_found = true;
                break;
            }
        }

        let mut expense_found = false;
        for caps in EXPENSE_RE.captures_iter(text) {
            if let Some(amount) = amount_at(&caps, 2) {
                updates.push(ProfileUpdate::RecurringExpense {
                    category: normalize_key(&caps[1]),
                    amount,
                });
                expense_found = true;
            }
        }
        for caps in EXPENSE_SPEND_RE.captures_iter(text) {
            if let Some(amount) = amount_at(&caps, 1) {
                updates.push(ProfileUpdate::RecurringExpense {
                    category: normalize_key(&caps[2]),
                    amount,
                });
                expense_found = true;
            }
        }

        let mut debt_found = false;
        for caps in DEBT_RE.captures_iter(text) {
            if let Some(amount) = amount_at(&caps, 2) {
                updates.push(ProfileUpdate::DebtBalance {
                    name: normalize_debt_name(&caps[1]),
                    balance: amount,
                });
                debt_found = true;
            }
        }
        for caps in DEBT_OWE_RE.captures_iter(text) {
            if let Some(amount) = amount_at(&caps, 1) {
                updates.push(ProfileUpdate::DebtBalance {
                    name: normalize_debt_name(&caps[2]),
                    balance: amount,
                });
                debt_found = true;
            }
        }

        let mut goal_found = false;
        for caps in GOAL_SAVE_RE.captures_iter(text).chain(GOAL_TARGET_RE.captures_iter(text)) {
            let name = normalize_key(&caps[1]);
            if GOAL_NAME_STOPWORDS.contains(&name.as_str()) {
                continue;
            }
            if let Some(target) = amount_at(&caps, 2) {
                updates.push(ProfileUpdate::GoalTarget { name, target });
                goal_found = true;
            }
        }

        // Labelled totals only fill kinds the detailed patterns missed.
        for (label, amount) in parse_financial_message(text) {
            let update = match label.as_str() {
                "income" if !income_found => ProfileUpdate::IncomeSource {
                    source: "primary".to_string(),
                    amount,
                },
                "expenses" if !expense_found => ProfileUpdate::RecurringExpense {
                    category: "general".to_string(),
                    amount,
                },
                "debts" if !debt_found => ProfileUpdate::DebtBalance {
                    name: "general".to_string(),
                    balance: amount,
                },
                "down_payment" if !goal_found => ProfileUpdate::GoalTarget {
                    name: "down_payment".to_string(),
                    target: amount,
                },
                _ => continue,
            };
            updates.push(update);
        }

        updates
    }

    /// Extract from `text` and merge into `profile`.
    pub fn apply(&self, profile: &mut FinancialProfile, text: &str, now: DateTime<Utc>) -> ExtractionOutcome {
        let updates = self.extract(text);
        let new_data_captured = profile.apply_all(updates, now);
        ExtractionOutcome {
            new_data_captured,
            summary: profile.summary(),
        }
    }
}

/// Labelled totals mentioned in a message: `income`, `expenses`, `debts`, `down_payment`.
///
/// The first amount found for each label wins.
pub fn parse_financial_message(text: &str) -> BTreeMap<String, f64> {
    let mut hits: Vec<(usize, String, f64)> = Vec::new();

    for caps in LABEL_FIRST_RE.captures_iter(text) {
        if let (Some(m), Some(amount)) = (caps.get(0), amount_at(&caps, 2)) {
            hits.push((m.start(), normalize_label(&caps[1]), amount));
        }
    }
    for caps in AMOUNT_FIRST_RE.captures_iter(text) {
        if let (Some(m), Some(amount)) = (caps.get(0), amount_at(&caps, 1)) {
            hits.push((m.start(), normalize_label(&caps[2]), amount));
        }
    }
    for caps in INCOME_VERB_RE.captures_iter(text) {
        if let (Some(m), Some(amount)) = (caps.get(0), amount_at(&caps, 1)) {
            hits.push((m.start(), "income".to_string(), amount));
        }
    }

    hits.sort_by_key(|(start, _, _)| *start);

    let mut parsed = BTreeMap::new();
    for (_, label, amount) in hits {
        parsed.entry(label).or_insert(amount);
    }
    parsed
}

fn amount_at(caps: &Captures<'_>, group: usize) -> Option<f64> {
    caps.get(group).and_then(|m| parse_amount(m.as_str()))
}

fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '$').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

fn normalize_debt_name(raw: &str) -> String {
    let key = normalize_key(raw);
    key.strip_suffix('s').map(str::to_string).unwrap_or(key)
}

fn normalize_label(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.starts_with("income") {
        "income".to_string()
    } else if lower.starts_with("expense") {
        "expenses".to_string()
    } else if lower.starts_with("debt") {
        "debts".to_string()
    } else {
        "down_payment".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_parse_income_only() {
        assert_eq!(parse_financial_message("my income is 5200"), parsed(&[("income", 5200.0)]));
    }

    #[test]
    fn test_parse_mixed_sentence_keeps_k_quirk() {
        let result = parse_financial_message(
            "i make $60k a year, have $2000 in monthly expenses, and $15,000 in debt",
        );
        assert_eq!(
            result,
            parsed(&[("income", 60.0), ("expenses", 2000.0), ("debts", 15000.0)])
        );
    }

    #[test]
    fn test_parse_down_payment_variants() {
        assert_eq!(
            parse_financial_message("down payment will be 5,000"),
            parsed(&[("down_payment", 5000.0)])
        );
        assert_eq!(
            parse_financial_message("downpayment: 10000, debts: 5000"),
            parsed(&[("down_payment", 10000.0), ("debts", 5000.0)])
        );
    }

    #[test]
    fn test_parse_income_and_expense_labels() {
        assert_eq!(
            parse_financial_message("my income is $5,200 and my rent expense is 1200"),
            parsed(&[("income", 5200.0), ("expenses", 1200.0)])
        );
    }

    #[test]
    fn test_parse_nothing() {
        assert!(parse_financial_message("how do I start investing?").is_empty());
    }

    #[test]
    fn test_extract_categorised_expenses() {
        let updates = ProfileExtractor::new()
            .extract("My rent is $1,200 and I spend $300 on groceries");
        assert!(updates.contains(&ProfileUpdate::RecurringExpense {
            category: "rent".into(),
            amount: 1200.0
        }));
        assert!(updates.contains(&ProfileUpdate::RecurringExpense {
            category: "groceries".into(),
            amount: 300.0
        }));
    }

    #[test]
    fn test_extract_debt_and_goal() {
        let updates = ProfileExtractor::new().extract(
            "I have a student loan with a balance of $25,000. I want to save for a new car, about $5000",
        );
        assert!(updates.contains(&ProfileUpdate::DebtBalance {
            name: "student_loan".into(),
            balance: 25000.0
        }));
        assert!(updates.contains(&ProfileUpdate::GoalTarget {
            name: "car".into(),
            target: 5000.0
        }));
    }

    #[test]
    fn test_extract_owe_phrase() {
        let updates = ProfileExtractor::new().extract("I owe $1,800 on my credit cards");
        assert_eq!(
            updates,
            vec![ProfileUpdate::DebtBalance { name: "credit_card".into(), balance: 1800.0 }]
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let now = Utc::now();
        let extractor = ProfileExtractor::new();
        let mut profile = FinancialProfile::new(now);

        let first = extractor.apply(&mut profile, "my income is 5200", now);
        assert!(first.new_data_captured);
        assert_eq!(profile.income.total(), 5200.0);

        let second = extractor.apply(&mut profile, "my income is 5200", now);
        assert!(!second.new_data_captured);
        assert_eq!(profile.income.total(), 5200.0);
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn test_apply_mixed_sentence_fills_profile() {
        let now = Utc::now();
        let mut profile = FinancialProfile::new(now);
        ProfileExtractor::new().apply(
            &mut profile,
            "i make $60k a year, have $2000 in monthly expenses, and $15,000 in debt",
            now,
        );
        assert_eq!(profile.income.total(), 60.0);
        assert_eq!(profile.total_monthly_expenses(), 2000.0);
        assert_eq!(profile.total_debt(), 15000.0);
    }

    #[test]
    fn test_labelled_total_skipped_when_category_found() {
        let updates = ProfileExtractor::new().extract("rent is 900 and my expenses are 1500");
        assert!(!updates.iter().any(|u| matches!(
            u,
            ProfileUpdate::RecurringExpense { category, .. } if category == "general"
        )));
    }
}
