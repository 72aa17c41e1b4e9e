//! Debt payoff simulation with and without an extra monthly payment

use serde::{Deserialize, Serialize};

use super::{ensure_non_negative, ensure_positive, round2};
use crate::Result;

/// How long a balance takes to clear at a fixed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PayoffTerm {
    Amortizing { months: u32 },
    /// The payment does not exceed the monthly interest; the balance never clears.
    NonAmortizing,
}

impl PayoffTerm {
    pub fn months(&self) -> Option<u32> {
        match self {
            Self::Amortizing { months } => Some(*months),
            Self::NonAmortizing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtPayoffSimulation {
    pub debt_type: String,
    pub original_payoff: PayoffTerm,
    pub new_payoff: PayoffTerm,
    pub months_saved: Option<i64>,
    /// `None` when either term never amortizes.
    pub total_interest_saved: Option<f64>,
    /// Payment freed up once the accelerated plan clears the debt.
    pub monthly_savings: f64,
}

/// n = -(1/r) * ln(1 - B*r/P). r = 0 gives B/P. `None` when the payment never clears the balance.
fn exact_months(balance: f64, monthly_rate: f64, payment: f64) -> Option<f64> {
    if payment <= 0.0 || payment <= balance * monthly_rate {
        return None;
    }
    let months = if monthly_rate == 0.0 {
        balance / payment
    } else {
        -(1.0 / monthly_rate) * (1.0 - balance * monthly_rate / payment).ln()
    };
    Some(months.max(0.0))
}

/// Whole months reported to the user; the fractional final month is truncated.
fn payoff_term(balance: f64, monthly_rate: f64, payment: f64) -> PayoffTerm {
    match exact_months(balance, monthly_rate, payment) {
        Some(months) => PayoffTerm::Amortizing { months: months as u32 },
        None => PayoffTerm::NonAmortizing,
    }
}

/// Interest paid over the unrounded term.
fn total_interest(balance: f64, monthly_rate: f64, payment: f64) -> Option<f64> {
    exact_months(balance, monthly_rate, payment).map(|n| (payment * n - balance).max(0.0))
}

pub fn simulate_debt_payoff(
    balance: f64,
    annual_rate: f64,
    current_payment: f64,
    extra_payment: f64,
    debt_type: &str,
) -> Result<DebtPayoffSimulation> {
    ensure_positive("debt balance", balance)?;
    ensure_non_negative("interest rate", annual_rate)?;
    ensure_positive("current payment", current_payment)?;
    ensure_non_negative("extra payment", extra_payment)?;

    let r = annual_rate / 100.0 / 12.0;
    let new_payment = current_payment + extra_payment;

    let original_payoff = payoff_term(balance, r, current_payment);
    let new_payoff = payoff_term(balance, r, new_payment);

    let total_interest_saved = match (
        total_interest(balance, r, current_payment),
        total_interest(balance, r, new_payment),
    ) {
        (Some(original), Some(accelerated)) => Some(round2(original - accelerated)),
        _ => None,
    };

    let months_saved = match (original_payoff.months(), new_payoff.months()) {
        (Some(original), Some(accelerated)) => Some(original as i64 - accelerated as i64),
        _ => None,
    };

    let monthly_savings = match new_payoff {
        PayoffTerm::Amortizing { .. } => current_payment,
        PayoffTerm::NonAmortizing => 0.0,
    };

    Ok(DebtPayoffSimulation {
        debt_type: debt_type.to_string(),
        original_payoff,
        new_payoff,
        months_saved,
        total_interest_saved,
        monthly_savings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_payment_shortens_term() {
        let sim = simulate_debt_payoff(5000.0, 18.0, 150.0, 100.0, "credit_card").unwrap();
        let original = sim.original_payoff.months().unwrap();
        let accelerated = sim.new_payoff.months().unwrap();
        assert!(accelerated < original);
        assert!(sim.total_interest_saved.unwrap() > 0.0);
        assert_eq!(sim.monthly_savings, 150.0);
    }

    #[test]
    fn test_payment_below_interest_is_non_amortizing() {
        // Monthly interest on 10,000 at 24% is 200.
        let sim = simulate_debt_payoff(10_000.0, 24.0, 150.0, 0.0, "credit_card").unwrap();
        assert_eq!(sim.original_payoff, PayoffTerm::NonAmortizing);
        assert_eq!(sim.total_interest_saved, None);
        assert_eq!(sim.months_saved, None);
        assert_eq!(sim.monthly_savings, 0.0);
    }

    #[test]
    fn test_extra_payment_can_rescue_non_amortizing_debt() {
        let sim = simulate_debt_payoff(10_000.0, 24.0, 150.0, 200.0, "credit_card").unwrap();
        assert_eq!(sim.original_payoff, PayoffTerm::NonAmortizing);
        assert!(matches!(sim.new_payoff, PayoffTerm::Amortizing { .. }));
        assert_eq!(sim.total_interest_saved, None);
    }

    #[test]
    fn test_zero_rate_term() {
        let sim = simulate_debt_payoff(1200.0, 0.0, 100.0, 0.0, "personal_loan").unwrap();
        assert_eq!(sim.original_payoff, PayoffTerm::Amortizing { months: 12 });
        assert_eq!(sim.total_interest_saved, Some(0.0));
    }

    #[test]
    fn test_term_serializes_with_status_tag() {
        let json = serde_json::to_value(PayoffTerm::Amortizing { months: 7 }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "amortizing", "months": 7}));
        let json = serde_json::to_value(PayoffTerm::NonAmortizing).unwrap();
        assert_eq!(json, serde_json::json!({"status": "non_amortizing"}));
    }

    #[test]
    fn test_zero_rate_partial_final_month_saves_no_interest() {
        let sim = simulate_debt_payoff(1250.0, 0.0, 100.0, 150.0, "personal_loan").unwrap();
        assert_eq!(sim.original_payoff, PayoffTerm::Amortizing { months: 12 });
        assert_eq!(sim.new_payoff, PayoffTerm::Amortizing { months: 5 });
        assert_eq!(sim.months_saved, Some(7));
        assert_eq!(sim.total_interest_saved, Some(0.0));
    }

    #[test]
    fn test_low_rate_interest_uses_fractional_term() {
        // 10.54 months at 100 vs 5.13 months at 200: about 53.6 vs 25.9 in interest.
        let sim = simulate_debt_payoff(1000.0, 12.0, 100.0, 100.0, "personal_loan").unwrap();
        assert_eq!(sim.original_payoff, PayoffTerm::Amortizing { months: 10 });
        assert_eq!(sim.new_payoff, PayoffTerm::Amortizing { months: 5 });
        let saved = sim.total_interest_saved.unwrap();
        assert!(saved > 27.0 && saved < 28.5, "saved {saved}");
    }
}
