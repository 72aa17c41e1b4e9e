//! Knowledge retrieval
//!
//! The agent asks a [`KnowledgeSource`] for related snippets once per turn.
//! The built-in source ranks a small set of financial literacy notes by
//! keyword overlap; a vector store can be plugged in behind the same trait.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub title: String,
    pub content: String,
    pub score: f64,
}

#[async_trait::async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// At most `limit` snippets, best match first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeSnippet>>;
}

struct Entry {
    title: String,
    content: String,
    keywords: Vec<String>,
}

pub struct KeywordKnowledgeBase {
    entries: Vec<Entry>,
}

const BUILTIN_NOTES: &[(&str, &[&str], &str)] = &[
    (
        "Emergency funds",
        &["emergency", "fund", "savings", "rainy", "unexpected"],
        "An emergency fund should cover three to six months of essential expenses and live in an easily accessible savings account.",
    ),
    (
        "50/30/20 budgeting",
        &["budget", "budgeting", "needs", "wants", "spending", "plan"],
        "A common starting budget splits after-tax income into 50% needs, 30% wants and 20% savings or extra debt payments.",
    ),
    (
        "Debt avalanche and snowball",
        &["debt", "payoff", "credit", "card", "loan", "avalanche", "snowball"],
        "The avalanche method pays the highest-interest debt first and minimizes interest; the snowball method pays the smallest balance first for quick wins.",
    ),
    (
        "Compound interest",
        &["compound", "interest", "grow", "growth", "invest", "early"],
        "Compound interest earns returns on past returns, so starting to save early matters more than the size of the first deposits.",
    ),
    (
        "Student loans",
        &["student", "loan", "loans", "tuition", "college", "repayment"],
        "Federal student loans offer income-driven repayment plans; paying interest while in school keeps the balance from growing.",
    ),
    (
        "Credit scores",
        &["credit", "score", "utilization", "history", "report"],
        "Payment history and credit utilization drive most of a credit score; keeping utilization under 30% helps.",
    ),
    (
        "Index funds",
        &["index", "fund", "funds", "stocks", "etf", "diversify", "invest", "investing"],
        "Low-cost index funds give broad diversification and are a common core holding for beginner investors.",
    ),
];

impl KeywordKnowledgeBase {
    pub fn new() -> Self {
        let entries = BUILTIN_NOTES
            .iter()
            .map(|(title, keywords, content)| Entry {
                title: title.to_string(),
                content: content.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        Self { entries }
    }

    pub fn with_entry(mut self, title: &str, keywords: &[&str], content: &str) -> Self {
        self.entries.push(Entry {
            title: title.to_string(),
            content: content.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        });
        self
    }

    fn rank(&self, query: &str, limit: usize) -> Vec<KnowledgeSnippet> {
        let words: HashSet<String> = query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        let mut scored: Vec<KnowledgeSnippet> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let hits = entry.keywords.iter().filter(|k| words.contains(*k)).count();
                (hits > 0).then(|| KnowledgeSnippet {
                    title: entry.title.clone(),
                    content: entry.content.clone(),
                    score: hits as f64 / entry.keywords.len() as f64,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        scored
    }
}

impl Default for KeywordKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KnowledgeSource for KeywordKnowledgeBase {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeSnippet>> {
        Ok(self.rank(query, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ranks_by_overlap() {
        let kb = KeywordKnowledgeBase::new();
        let hits = kb.search("How big should my emergency fund savings be?", 3).await.unwrap();
        assert_eq!(hits[0].title, "Emergency funds");
        assert!(hits.len() <= 3);
    }

    #[test]
    fn test_no_overlap_returns_nothing() {
        let kb = KeywordKnowledgeBase::new();
        let hits = tokio_test::block_on(kb.search("what a lovely morning", 3)).unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_custom_entry() {
        let kb = KeywordKnowledgeBase::new().with_entry("Roth IRA", &["Roth", "IRA"], "Contributions grow tax-free.");
        let hits = kb.search("should I open a roth ira", 1).await.unwrap();
        assert_eq!(hits[0].title, "Roth IRA");
        assert_eq!(hits[0].score, 1.0);
    }
}
