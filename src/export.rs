//! Budget sheet export
//!
//! Renders a profile as a sectioned CSV document and stores it under the
//! exports directory for later download.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::calculators::round2;
use crate::error::AgentError;
use crate::profile::FinancialProfile;
use crate::Result;

/// Stored export, addressed by file name.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportHandle {
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSheetSummary {
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub net_income: f64,
    pub total_debt: f64,
    pub savings_goals: f64,
}

pub fn budget_summary(profile: &FinancialProfile) -> BudgetSheetSummary {
    let income = profile.income.total();
    let expenses = profile.total_monthly_expenses();
    BudgetSheetSummary {
        monthly_income: round2(income),
        monthly_expenses: round2(expenses),
        net_income: round2(income - expenses),
        total_debt: round2(profile.total_debt()),
        savings_goals: round2(profile.goals.values().map(|g| g.target).sum()),
    }
}

#[async_trait::async_trait]
pub trait BudgetExporter: Send + Sync {
    async fn export(&self, owner: &str, profile: &FinancialProfile) -> Result<ExportHandle>;
}

/// Writes `.csv` files into a directory
pub struct CsvBudgetExporter {
    dir: PathBuf,
}

impl CsvBudgetExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl BudgetExporter for CsvBudgetExporter {
    async fn export(&self, owner: &str, profile: &FinancialProfile) -> Result<ExportHandle> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let id = Uuid::new_v4().simple().to_string();
        let filename = format!("budget_{}_{}.csv", slug(owner), &id[..8]);
        let path = self.dir.join(&filename);

        tokio::fs::write(&path, render_budget_sheet(owner, profile)).await?;
        info!(filename = %filename, "Budget sheet exported");

        Ok(ExportHandle { filename, path })
    }
}

/// CSV document with a summary section followed by one section per populated part of the profile.
pub fn render_budget_sheet(owner: &str, profile: &FinancialProfile) -> String {
    let summary = budget_summary(profile);
    let mut rows: Vec<Vec<String>> = vec![
        vec![format!("Budget for {}", owner)],
        vec![],
        vec!["Summary".into()],
        vec!["Item".into(), "Amount".into()],
        vec!["Monthly Income".into(), money(summary.monthly_income)],
        vec!["Monthly Expenses".into(), money(summary.monthly_expenses)],
        vec!["Net Income".into(), money(summary.net_income)],
        vec!["Total Debt".into(), money(summary.total_debt)],
        vec!["Savings Goals".into(), money(summary.savings_goals)],
    ];

    if !profile.income.sources().is_empty() {
        rows.push(vec![]);
        rows.push(vec!["Income".into()]);
        rows.push(vec!["Source".into(), "Amount".into()]);
        for (source, amount) in profile.income.sources() {
            rows.push(vec![source.clone(), money(*amount)]);
        }
    }

    if !profile.expenses.recurring.is_empty() {
        rows.push(vec![]);
        rows.push(vec!["Expenses".into()]);
        rows.push(vec!["Category".into(), "Amount".into()]);
        for (category, amount) in &profile.expenses.recurring {
            rows.push(vec![category.clone(), money(*amount)]);
        }
    }

    if !profile.debts.is_empty() {
        rows.push(vec![]);
        rows.push(vec!["Debts".into()]);
        rows.push(vec![
            "Debt".into(),
            "Balance".into(),
            "Rate (%)".into(),
            "Monthly Payment".into(),
        ]);
        for (name, debt) in &profile.debts {
            rows.push(vec![
                name.clone(),
                money(debt.balance),
                format!("{:.2}", debt.rate),
                money(debt.payment),
            ]);
        }
    }

    if !profile.goals.is_empty() {
        rows.push(vec![]);
        rows.push(vec!["Goals".into()]);
        rows.push(vec![
            "Goal".into(),
            "Current".into(),
            "Target".into(),
            "Progress".into(),
        ]);
        for (name, goal) in &profile.goals {
            rows.push(vec![
                name.clone(),
                money(goal.current),
                money(goal.target),
                format!("{:.1}%", goal.progress_percent()),
            ]);
        }
    }

    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Resolve a download name inside `dir`, refusing anything that could escape it.
pub fn resolve_export_path(dir: &Path, filename: &str) -> Result<PathBuf> {
    let invalid = filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
        || Path::new(filename).is_absolute();
    if invalid {
        return Err(AgentError::Validation("Invalid filename".to_string()));
    }
    Ok(dir.join(filename))
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn slug(value: &str) -> String {
    let slug: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "user".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Debt, ProfileUpdate};
    use chrono::Utc;

    fn sample_profile() -> FinancialProfile {
        let now = Utc::now();
        let mut profile = FinancialProfile::new(now);
        profile.apply_all(
            vec![
                ProfileUpdate::IncomeSource { source: "primary".into(), amount: 3000.0 },
                ProfileUpdate::RecurringExpense { category: "rent".into(), amount: 1100.0 },
                ProfileUpdate::Debt {
                    name: "car_loan".into(),
                    debt: Debt { balance: 6000.0, rate: 4.5, payment: 210.0 },
                },
                ProfileUpdate::GoalTarget { name: "laptop".into(), target: 1200.0 },
            ],
            now,
        );
        profile
    }

    #[test]
    fn test_render_sections() {
        let csv = render_budget_sheet("Jo, Jr.", &sample_profile());
        assert!(csv.starts_with("\"Budget for Jo, Jr.\"\n"));
        assert!(csv.contains("Net Income,1900.00"));
        assert!(csv.contains("Debt,Balance,Rate (%),Monthly Payment\ncar_loan,6000.00,4.50,210.00"));
        assert!(csv.contains("laptop,0.00,1200.00,0.0%"));
    }

    #[test]
    fn test_render_skips_empty_sections() {
        let csv = render_budget_sheet("Jo", &FinancialProfile::new(Utc::now()));
        assert!(!csv.contains("Debts"));
        assert!(csv.contains("Monthly Income,0.00"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = Path::new("/srv/exports");
        assert!(resolve_export_path(dir, "../etc/passwd").is_err());
        assert!(resolve_export_path(dir, "a/b.csv").is_err());
        assert!(resolve_export_path(dir, "a\\b.csv").is_err());
        assert!(resolve_export_path(dir, "").is_err());
        assert_eq!(
            resolve_export_path(dir, "budget_jo_1234.csv").unwrap(),
            dir.join("budget_jo_1234.csv")
        );
    }

    #[tokio::test]
    async fn test_csv_exporter_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvBudgetExporter::new(dir.path().join("nested"));
        let handle = exporter.export("Jo Smith", &sample_profile()).await.unwrap();
        assert!(handle.filename.starts_with("budget_jo_smith_"));
        let body = std::fs::read_to_string(&handle.path).unwrap();
        assert!(body.contains("Monthly Income,3000.00"));
    }
}
