//! Budgeting and profile-level tools

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::Tool;
use crate::calculators::{
    enhanced_health_score, ensure_non_negative, ensure_positive, student_budget_template, BudgetTemplate,
    HealthScore,
};
use crate::clock::Clock;
use crate::export::{budget_summary, BudgetExporter, BudgetSheetSummary};
use crate::profile::{Debt, FinancialProfile, ProfileUpdate, DEFAULT_DEBT_RATE};
use crate::Result;

fn default_user_name() -> String {
    "Student".to_string()
}

fn default_debt_rate() -> f64 {
    DEFAULT_DEBT_RATE
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebtInput {
    pub balance: f64,
    #[serde(default = "default_debt_rate")]
    pub rate: f64,
    #[serde(default)]
    pub payment: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalInput {
    pub target: f64,
    #[serde(default)]
    pub current: f64,
}

/// Build a profile from the flat maps the planning tools accept.
fn profile_from_parts(
    income: f64,
    expenses: &BTreeMap<String, f64>,
    debts: &BTreeMap<String, DebtInput>,
    goals: &BTreeMap<String, GoalInput>,
    clock: &dyn Clock,
) -> FinancialProfile {
    let now = clock.now();
    let mut profile = FinancialProfile::new(now);

    let mut updates = vec![ProfileUpdate::IncomeSource {
        source: "primary".to_string(),
        amount: income,
    }];
    updates.extend(expenses.iter().map(|(category, amount)| ProfileUpdate::RecurringExpense {
        category: category.clone(),
        amount: *amount,
    }));
    updates.extend(debts.iter().map(|(name, debt)| ProfileUpdate::Debt {
        name: name.clone(),
        debt: Debt {
            balance: debt.balance,
            rate: debt.rate,
            payment: debt.payment,
        },
    }));
    for (name, goal) in goals {
        updates.push(ProfileUpdate::GoalTarget {
            name: name.clone(),
            target: goal.target,
        });
        updates.push(ProfileUpdate::GoalProgress {
            name: name.clone(),
            current: goal.current,
        });
    }

    profile.apply_all(updates, now);
    profile
}

fn ensure_amounts(label: &str, values: impl IntoIterator<Item = f64>) -> Result<()> {
    for value in values {
        ensure_non_negative(label, value)?;
    }
    Ok(())
}

fn debt_and_goal_schema() -> (Value, Value) {
    (
        json!({
            "type": "object",
            "description": "Debts keyed by name",
            "additionalProperties": {
                "type": "object",
                "properties": {
                    "balance": {"type": "number"},
                    "rate": {"type": "number"},
                    "payment": {"type": "number"}
                },
                "required": ["balance"]
            }
        }),
        json!({
            "type": "object",
            "description": "Savings goals keyed by name",
            "additionalProperties": {
                "type": "object",
                "properties": {
                    "target": {"type": "number"},
                    "current": {"type": "number"}
                },
                "required": ["target"]
            }
        }),
    )
}

// ===== Student budget template =====

#[derive(Debug, Deserialize)]
pub struct BudgetTemplateInput {
    #[serde(default = "default_user_name")]
    pub user_name: String,
    pub monthly_income: f64,
    #[serde(default)]
    pub housing_cost: Option<f64>,
    #[serde(default)]
    pub meal_plan: Option<f64>,
}

pub struct BudgetTemplateTool {
    clock: Arc<dyn Clock>,
}

impl BudgetTemplateTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait::async_trait]
impl Tool for BudgetTemplateTool {
    type Input = BudgetTemplateInput;
    type Output = BudgetTemplate;

    fn name(&self) -> &'static str {
        "generate_budget_template"
    }

    fn description(&self) -> &'static str {
        "Create a student budget that splits monthly income across housing, food, transportation, textbooks, personal care, entertainment, emergency fund and savings."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_name": {"type": "string"},
                "monthly_income": {"type": "number"},
                "housing_cost": {"type": "number", "description": "Actual monthly housing cost, if known"},
                "meal_plan": {"type": "number", "description": "Actual monthly food or meal plan cost, if known"}
            },
            "required": ["monthly_income"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["categories", "total_expenses", "remaining", "recommendations"]
        })
    }

    fn validate(&self, input: &BudgetTemplateInput) -> Result<()> {
        ensure_positive("monthly income", input.monthly_income)?;
        ensure_amounts("housing cost", input.housing_cost)?;
        ensure_amounts("meal plan", input.meal_plan)
    }

    async fn run(&self, input: BudgetTemplateInput) -> Result<BudgetTemplate> {
        student_budget_template(
            &input.user_name,
            input.monthly_income,
            input.housing_cost,
            input.meal_plan,
            self.clock.now().date_naive(),
        )
    }
}

// ===== Financial health score =====

#[derive(Debug, Deserialize)]
pub struct HealthScoreInput {
    pub monthly_income: f64,
    #[serde(default)]
    pub expenses: BTreeMap<String, f64>,
    #[serde(default)]
    pub debts: BTreeMap<String, DebtInput>,
    #[serde(default)]
    pub goals: BTreeMap<String, GoalInput>,
    #[serde(default)]
    pub emergency_savings: Option<f64>,
}

pub struct HealthScoreTool {
    clock: Arc<dyn Clock>,
}

impl HealthScoreTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait::async_trait]
impl Tool for HealthScoreTool {
    type Input = HealthScoreInput;
    type Output = HealthScore;

    fn name(&self) -> &'static str {
        "calculate_financial_health_score"
    }

    fn description(&self) -> &'static str {
        "Score overall financial health from 0 to 100 using spending, debt, emergency fund and savings goal progress, with a letter grade and recommendations."
    }

    fn input_schema(&self) -> Value {
        let (debts, goals) = debt_and_goal_schema();
        json!({
            "type": "object",
            "properties": {
                "monthly_income": {"type": "number"},
                "expenses": {
                    "type": "object",
                    "description": "Monthly expenses keyed by category",
                    "additionalProperties": {"type": "number"}
                },
                "debts": debts,
                "goals": goals,
                "emergency_savings": {"type": "number", "description": "Money already set aside for emergencies"}
            },
            "required": ["monthly_income"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["score", "grade", "status", "breakdown", "recommendations"]
        })
    }

    fn validate(&self, input: &HealthScoreInput) -> Result<()> {
        ensure_non_negative("monthly income", input.monthly_income)?;
        ensure_amounts("expense", input.expenses.values().copied())?;
        ensure_amounts("debt", input.debts.values().flat_map(|d| [d.balance, d.rate, d.payment]))?;
        ensure_amounts("goal", input.goals.values().flat_map(|g| [g.target, g.current]))?;
        ensure_amounts("emergency savings", input.emergency_savings)
    }

    async fn run(&self, input: HealthScoreInput) -> Result<HealthScore> {
        let mut profile = profile_from_parts(
            input.monthly_income,
            &input.expenses,
            &input.debts,
            &input.goals,
            self.clock.as_ref(),
        );
        if let Some(amount) = input.emergency_savings {
            profile.apply(
                ProfileUpdate::Asset {
                    name: "emergency_savings".to_string(),
                    amount,
                },
                self.clock.now(),
            );
        }
        Ok(enhanced_health_score(&profile))
    }
}

// ===== Budget sheet export =====

#[derive(Debug, Deserialize)]
pub struct BudgetSheetInput {
    #[serde(default = "default_user_name")]
    pub user_name: String,
    pub income: f64,
    #[serde(default)]
    pub expenses: BTreeMap<String, f64>,
    #[serde(default)]
    pub debts: BTreeMap<String, DebtInput>,
    #[serde(default)]
    pub goals: BTreeMap<String, GoalInput>,
}

#[derive(Debug, Serialize)]
pub struct BudgetSheetOutput {
    pub filename: String,
    pub download_url: String,
    pub summary: BudgetSheetSummary,
    pub categories: Vec<String>,
}

pub struct BudgetSheetTool {
    exporter: Arc<dyn BudgetExporter>,
    clock: Arc<dyn Clock>,
}

impl BudgetSheetTool {
    pub fn new(exporter: Arc<dyn BudgetExporter>, clock: Arc<dyn Clock>) -> Self {
        Self { exporter, clock }
    }
}

#[async_trait::async_trait]
impl Tool for BudgetSheetTool {
    type Input = BudgetSheetInput;
    type Output = BudgetSheetOutput;

    fn name(&self) -> &'static str {
        "generate_budget_sheet"
    }

    fn description(&self) -> &'static str {
        "Create a downloadable budget spreadsheet (CSV) from income, expenses, debts and savings goals."
    }

    fn input_schema(&self) -> Value {
        let (debts, goals) = debt_and_goal_schema();
        json!({
            "type": "object",
            "properties": {
                "user_name": {"type": "string"},
                "income": {"type": "number", "description": "Monthly income"},
                "expenses": {
                    "type": "object",
                    "description": "Monthly expenses keyed by category",
                    "additionalProperties": {"type": "number"}
                },
                "debts": debts,
                "goals": goals
            },
            "required": ["income"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["filename", "download_url", "summary", "categories"]
        })
    }

    fn validate(&self, input: &BudgetSheetInput) -> Result<()> {
        ensure_positive("income", input.income)?;
        ensure_amounts("expense", input.expenses.values().copied())?;
        ensure_amounts("debt", input.debts.values().flat_map(|d| [d.balance, d.rate, d.payment]))?;
        ensure_amounts("goal", input.goals.values().flat_map(|g| [g.target, g.current]))
    }

    async fn run(&self, input: BudgetSheetInput) -> Result<BudgetSheetOutput> {
        let profile = profile_from_parts(
            input.income,
            &input.expenses,
            &input.debts,
            &input.goals,
            self.clock.as_ref(),
        );
        let handle = self.exporter.export(&input.user_name, &profile).await?;

        Ok(BudgetSheetOutput {
            download_url: format!("/download/{}", handle.filename),
            filename: handle.filename,
            summary: budget_summary(&profile),
            categories: profile.expenses.recurring.keys().cloned().collect(),
        })
    }
}
