//! Per-conversation financial profile
//!
//! The profile is only ever changed through [`FinancialProfile::apply`], which
//! keeps `income.total` equal to the sum of the income sources and rejects
//! negative or non-finite amounts.

pub mod extractor;
pub mod llm_fallback;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calculators::format_currency;

pub use extractor::{parse_financial_message, ExtractionOutcome, ProfileExtractor};

/// Returned by [`FinancialProfile::summary`] when nothing has been captured.
pub const EMPTY_PROFILE_SUMMARY: &str = "No financial data captured yet. Ask the user about their income, expenses, debts, and savings goals.";

/// Placeholder rate for debts whose rate the user has not stated.
pub const DEFAULT_DEBT_RATE: f64 = 5.5;

//
// ================= Income =================
//

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "IncomeRepr")]
pub struct Income {
    total: f64,
    sources: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct IncomeRepr {
    #[serde(default)]
    sources: BTreeMap<String, f64>,
}

impl From<IncomeRepr> for Income {
    fn from(repr: IncomeRepr) -> Self {
        let mut income = Income {
            total: 0.0,
            sources: repr.sources,
        };
        income.recompute();
        income
    }
}

impl Income {
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn sources(&self) -> &BTreeMap<String, f64> {
        &self.sources
    }

    fn set_source(&mut self, source: &str, amount: f64) -> bool {
        if self.sources.get(source) == Some(&amount) {
            return false;
        }
        self.sources.insert(source.to_string(), amount);
        self.recompute();
        true
    }

    fn recompute(&mut self) {
        self.total = self.sources.values().sum();
    }
}

//
// ================= Expenses / Debts / Goals =================
//

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expenses {
    #[serde(default)]
    pub recurring: BTreeMap<String, f64>,
    #[serde(default)]
    pub one_time: BTreeMap<String, f64>,
}

impl Expenses {
    pub fn total_recurring(&self) -> f64 {
        self.recurring.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub balance: f64,
    pub rate: f64,
    pub payment: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub target: f64,
    pub current: f64,
}

impl SavingsGoal {
    /// Progress in percent, 0 when the target is unset.
    pub fn progress_percent(&self) -> f64 {
        if self.target > 0.0 {
            self.current / self.target * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentExperience {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

//
// ================= Updates =================
//

/// A single change to a profile. Every mutation goes through one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileUpdate {
    IncomeSource { source: String, amount: f64 },
    RecurringExpense { category: String, amount: f64 },
    OneTimeExpense { category: String, amount: f64 },
    /// Sets the balance, keeping an existing rate/payment or using placeholders.
    DebtBalance { name: String, balance: f64 },
    Debt { name: String, debt: Debt },
    /// Sets the target, keeping existing progress.
    GoalTarget { name: String, target: f64 },
    GoalProgress { name: String, current: f64 },
    Asset { name: String, amount: f64 },
}

impl ProfileUpdate {
    fn amounts(&self) -> Vec<f64> {
        match self {
            Self::IncomeSource { amount, .. }
            | Self::RecurringExpense { amount, .. }
            | Self::OneTimeExpense { amount, .. }
            | Self::Asset { amount, .. } => vec![*amount],
            Self::DebtBalance { balance, .. } => vec![*balance],
            Self::Debt { debt, .. } => vec![debt.balance, debt.rate, debt.payment],
            Self::GoalTarget { target, .. } => vec![*target],
            Self::GoalProgress { current, .. } => vec![*current],
        }
    }
}

//
// ================= Profile =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialProfile {
    #[serde(default)]
    pub income: Income,
    #[serde(default)]
    pub expenses: Expenses,
    #[serde(default)]
    pub debts: BTreeMap<String, Debt>,
    #[serde(default)]
    pub goals: BTreeMap<String, SavingsGoal>,
    #[serde(default)]
    pub assets: BTreeMap<String, f64>,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    #[serde(default)]
    pub investment_experience: InvestmentExperience,
    pub last_updated: DateTime<Utc>,
}

impl Default for FinancialProfile {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl FinancialProfile {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            income: Income::default(),
            expenses: Expenses::default(),
            debts: BTreeMap::new(),
            goals: BTreeMap::new(),
            assets: BTreeMap::new(),
            risk_tolerance: RiskTolerance::default(),
            investment_experience: InvestmentExperience::default(),
            last_updated: now,
        }
    }

    /// Apply one update. Returns true if the profile changed.
    pub fn apply(&mut self, update: ProfileUpdate, now: DateTime<Utc>) -> bool {
        if update.amounts().iter().any(|v| !v.is_finite() || *v < 0.0) {
            return false;
        }

        let changed = match update {
            ProfileUpdate::IncomeSource { source, amount } => self.income.set_source(&source, amount),
            ProfileUpdate::RecurringExpense { category, amount } => {
                insert_if_changed(&mut self.expenses.recurring, category, amount)
            }
            ProfileUpdate::OneTimeExpense { category, amount } => {
                insert_if_changed(&mut self.expenses.one_time, category, amount)
            }
            ProfileUpdate::DebtBalance { name, balance } => {
                let debt = match self.debts.get(&name) {
                    Some(existing) => Debt { balance, ..*existing },
                    None => Debt {
                        balance,
                        rate: DEFAULT_DEBT_RATE,
                        payment: 0.0,
                    },
                };
                insert_if_changed(&mut self.debts, name, debt)
            }
            ProfileUpdate::Debt { name, debt } => insert_if_changed(&mut self.debts, name, debt),
            ProfileUpdate::GoalTarget { name, target } => {
                let goal = match self.goals.get(&name) {
                    Some(existing) => SavingsGoal { target, ..*existing },
                    None => SavingsGoal { target, current: 0.0 },
                };
                insert_if_changed(&mut self.goals, name, goal)
            }
            ProfileUpdate::GoalProgress { name, current } => {
                let goal = match self.goals.get(&name) {
                    Some(existing) => SavingsGoal { current, ..*existing },
                    None => SavingsGoal { target: 0.0, current },
                };
                insert_if_changed(&mut self.goals, name, goal)
            }
            ProfileUpdate::Asset { name, amount } => insert_if_changed(&mut self.assets, name, amount),
        };

        if changed {
            self.last_updated = now;
        }
        changed
    }

    /// Apply several updates; true if any of them changed the profile.
    pub fn apply_all(&mut self, updates: impl IntoIterator<Item = ProfileUpdate>, now: DateTime<Utc>) -> bool {
        updates
            .into_iter()
            .fold(false, |changed, update| self.apply(update, now) || changed)
    }

    pub fn total_monthly_expenses(&self) -> f64 {
        self.expenses.total_recurring()
    }

    pub fn total_debt(&self) -> f64 {
        self.debts.values().map(|d| d.balance).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.income.total() <= 0.0
            && self.expenses.recurring.is_empty()
            && self.expenses.one_time.is_empty()
            && self.debts.is_empty()
            && self.goals.is_empty()
    }

    /// Fraction (0.0 to 1.0) of the four core sections that hold data.
    pub fn completeness(&self) -> f64 {
        let filled = [
            self.income.total() > 0.0,
            !self.expenses.recurring.is_empty(),
            !self.debts.is_empty(),
            !self.goals.is_empty(),
        ]
        .iter()
        .filter(|f| **f)
        .count();
        filled as f64 / 4.0
    }

    /// Money set aside for emergencies: an "emergency" goal's progress, else a matching asset.
    pub fn emergency_fund(&self) -> f64 {
        if let Some(goal) = self
            .goals
            .iter()
            .find(|(name, _)| name.to_lowercase().contains("emergency"))
            .map(|(_, goal)| goal)
        {
            return goal.current;
        }
        self.assets
            .iter()
            .filter(|(name, _)| name.to_lowercase().contains("emergency"))
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Text summary injected into the reasoning prompt.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return EMPTY_PROFILE_SUMMARY.to_string();
        }

        let mut lines = vec!["Financial Profile Summary:".to_string()];

        if self.income.total() > 0.0 {
            lines.push(format!("- Monthly Income: {}", format_currency(self.income.total())));
        }

        if !self.expenses.recurring.is_empty() {
            lines.push(format!(
                "- Monthly Expenses: {}",
                format_currency(self.total_monthly_expenses())
            ));
            let breakdown: Vec<String> = self
                .expenses
                .recurring
                .iter()
                .map(|(category, amount)| format!("{} {}", category, format_currency(*amount)))
                .collect();
            lines.push(format!("  Breakdown: {}", breakdown.join(", ")));
        }

        if !self.expenses.one_time.is_empty() {
            let total: f64 = self.expenses.one_time.values().sum();
            lines.push(format!("- One-time Expenses: {}", format_currency(total)));
        }

        if !self.debts.is_empty() {
            lines.push(format!("- Total Debt: {}", format_currency(self.total_debt())));
            for (name, debt) in &self.debts {
                lines.push(format!("  {}: {}", name, format_currency(debt.balance)));
            }
        }

        if !self.goals.is_empty() {
            lines.push("- Savings Goals:".to_string());
            for (name, goal) in &self.goals {
                lines.push(format!(
                    "  {}: {} / {} ({:.1}%)",
                    name,
                    format_currency(goal.current),
                    format_currency(goal.target),
                    goal.progress_percent()
                ));
            }
        }

        lines.join("\n")
    }
}

fn insert_if_changed<V: PartialEq>(map: &mut BTreeMap<String, V>, key: String, value: V) -> bool {
    if map.get(&key) == Some(&value) {
        return false;
    }
    map.insert(key, value);
    true
}
