//! Deterministic financial calculators
//!
//! Pure functions: identical inputs always give bit-identical outputs.
//! Monetary outputs are rounded to cents.

pub mod budget;
pub mod debt;
pub mod health;
pub mod investment;
pub mod loan;
pub mod savings;

use crate::error::AgentError;
use crate::Result;

pub use budget::{student_budget_template, BudgetCategory, BudgetTemplate};
pub use debt::{simulate_debt_payoff, DebtPayoffSimulation, PayoffTerm};
pub use health::{enhanced_health_score, HealthGrade, HealthScore};
pub use investment::{investment_allocation, InvestmentPlan};
pub use loan::{amortization_schedule, monthly_payment, payoff_scenarios, AmortizationEntry, PayoffScenarios};
pub use savings::{future_value, required_monthly_savings, savings_requirement, FutureValue, RequiredSavings, SavingsRequirement};

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format as US dollars with thousands separators, e.g. `$1,234.56`.
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, fraction)
}

pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AgentError::Validation(format!("{} must be greater than zero", name)))
    }
}

pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AgentError::Validation(format!("{} must not be negative", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.5), "$999.50");
        assert_eq!(format_currency(1234.567), "$1,234.57");
        assert_eq!(format_currency(25000.0), "$25,000.00");
        assert_eq!(format_currency(1234567.0), "$1,234,567.00");
        assert_eq!(format_currency(-42.1), "-$42.10");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(106.0655), 106.07);
        assert_eq!(round2(2.0), 2.0);
    }

    #[test]
    fn test_guards() {
        assert!(ensure_positive("principal", 0.0).is_err());
        assert!(ensure_positive("principal", f64::INFINITY).is_err());
        assert!(ensure_non_negative("rate", 0.0).is_ok());
        assert!(ensure_non_negative("rate", -1.0).is_err());
    }
}
