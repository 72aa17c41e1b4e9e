//! Student budget template

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ensure_non_negative, ensure_positive, format_currency, round2};
use crate::Result;

/// (name, percent of income, description). Percentages sum to 100.
const CATEGORY_WEIGHTS: &[(&str, u32, &str)] = &[
    ("Housing", 35, "Rent, utilities, dorm fees"),
    ("Food", 20, "Meal plan, groceries, dining out"),
    ("Transportation", 10, "Bus pass, gas, car maintenance"),
    ("Textbooks & Supplies", 8, "Books, software, lab materials"),
    ("Personal Care", 5, "Clothing, hygiene, healthcare"),
    ("Entertainment", 7, "Movies, subscriptions, social activities"),
    ("Emergency Fund", 10, "Unexpected expenses"),
    ("Savings", 5, "Long-term savings goals"),
];

const DISCRETIONARY: &[&str] = &["Entertainment", "Personal Care", "Food"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCategory {
    pub amount: f64,
    pub percentage: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetTemplate {
    pub user_name: String,
    pub monthly_income: f64,
    pub categories: BTreeMap<String, BudgetCategory>,
    pub total_expenses: f64,
    pub remaining: f64,
    pub recommendations: Vec<String>,
    pub creation_date: NaiveDate,
}

/// Split `income` across the fixed student categories.
///
/// `housing_cost` and `meal_plan` replace the computed Housing and Food
/// amounts when given; the category percentages stay at their fixed weights.
pub fn student_budget_template(
    user_name: &str,
    income: f64,
    housing_cost: Option<f64>,
    meal_plan: Option<f64>,
    creation_date: NaiveDate,
) -> Result<BudgetTemplate> {
    ensure_positive("income", income)?;
    if let Some(housing) = housing_cost {
        ensure_non_negative("housing cost", housing)?;
    }
    if let Some(meals) = meal_plan {
        ensure_non_negative("meal plan", meals)?;
    }

    let mut categories = BTreeMap::new();
    for (name, percentage, description) in CATEGORY_WEIGHTS {
        let computed = income * *percentage as f64 / 100.0;
        let amount = match *name {
            "Housing" => housing_cost.filter(|v| *v > 0.0).unwrap_or(computed),
            "Food" => meal_plan.filter(|v| *v > 0.0).unwrap_or(computed),
            _ => computed,
        };
        categories.insert(
            name.to_string(),
            BudgetCategory {
                amount: round2(amount),
                percentage: *percentage,
                description: description.to_string(),
            },
        );
    }

    let total_expenses = round2(categories.values().map(|c| c.amount).sum());
    let remaining = round2(income - total_expenses);
    let recommendations = recommendations(income, remaining, &categories);

    Ok(BudgetTemplate {
        user_name: user_name.to_string(),
        monthly_income: income,
        categories,
        total_expenses,
        remaining,
        recommendations,
        creation_date,
    })
}

fn amount_of(categories: &BTreeMap<String, BudgetCategory>, name: &str) -> f64 {
    categories.get(name).map(|c| c.amount).unwrap_or(0.0)
}

fn recommendations(income: f64, remaining: f64, categories: &BTreeMap<String, BudgetCategory>) -> Vec<String> {
    let mut out = Vec::new();

    if remaining < 0.0 {
        out.push(format!(
            "Your expenses exceed your income by {}. Consider reducing discretionary spending.",
            format_currency(remaining.abs())
        ));
        for name in DISCRETIONARY {
            let amount = amount_of(categories, name);
            if amount > income * 0.05 {
                out.push(format!(
                    "Consider reducing {} spending by {}",
                    name,
                    format_currency(amount * 0.1)
                ));
            }
        }
    } else if remaining > income * 0.15 {
        out.push(format!(
            "Great job! You have {} left over. Consider increasing your savings or emergency fund.",
            format_currency(remaining)
        ));
    }

    if amount_of(categories, "Emergency Fund") < income * 0.08 {
        out.push("Try to save at least 8-10% of income for emergencies".to_string());
    }
    if amount_of(categories, "Savings") < income * 0.05 {
        out.push("Aim to save at least 5% of income for long-term goals".to_string());
    }
    if amount_of(categories, "Food") > income * 0.25 {
        out.push("Food costs are high. Consider meal planning and cooking at home more often".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
    }

    #[test]
    fn test_percentages_sum_to_100() {
        let template = student_budget_template("Ana", 1800.0, Some(900.0), Some(500.0), date()).unwrap();
        let total: u32 = template.categories.values().map(|c| c.percentage).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_default_split() {
        let template = student_budget_template("Ana", 2000.0, None, None, date()).unwrap();
        assert_eq!(template.categories["Housing"].amount, 700.0);
        assert_eq!(template.categories["Food"].amount, 400.0);
        assert_eq!(template.total_expenses, 2000.0);
        assert_eq!(template.remaining, 0.0);
    }

    #[test]
    fn test_overrides_and_deficit_advice() {
        let template = student_budget_template("Ana", 2000.0, Some(1200.0), Some(700.0), date()).unwrap();
        assert_eq!(template.categories["Housing"].amount, 1200.0);
        assert_eq!(template.categories["Housing"].percentage, 35);
        assert!(template.remaining < 0.0);
        assert!(template.recommendations[0].starts_with("Your expenses exceed your income"));
        assert!(template
            .recommendations
            .iter()
            .any(|r| r.contains("Food costs are high")));
    }

    #[test]
    fn test_rejects_non_positive_income() {
        assert!(student_budget_template("Ana", 0.0, None, None, date()).is_err());
    }
}
