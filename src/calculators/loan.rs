//! Loan payment, amortization and payoff comparison

use serde::{Deserialize, Serialize};

use super::{ensure_non_negative, ensure_positive, round2};
use crate::Result;

/// Extra principal payments compared against the minimum schedule.
pub const EXTRA_PAYMENT_SCENARIOS: [f64; 3] = [50.0, 100.0, 200.0];

/// Periods allowed beyond the nominal term before the balance is forced to zero.
const SCHEDULE_GRACE_PERIODS: u32 = 120;

fn validate(principal: f64, annual_rate: f64, years: u32) -> Result<()> {
    ensure_positive("principal", principal)?;
    ensure_non_negative("annual rate", annual_rate)?;
    if years == 0 {
        return Err(crate::error::AgentError::Validation(
            "years must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Fixed monthly payment for a fully amortizing loan, rounded to cents.
pub fn monthly_payment(principal: f64, annual_rate: f64, years: u32) -> Result<f64> {
    validate(principal, annual_rate, years)?;

    let months = years as f64 * 12.0;
    if annual_rate == 0.0 {
        return Ok(round2(principal / months));
    }

    let r = annual_rate / 100.0 / 12.0;
    let factor = (1.0 + r).powf(months);
    Ok(round2(principal * r * factor / (factor - 1.0)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationEntry {
    pub payment_number: u32,
    pub beginning_balance: f64,
    pub payment_amount: f64,
    pub principal: f64,
    pub interest: f64,
    pub ending_balance: f64,
    pub cumulative_interest: f64,
}

/// Period-by-period schedule. The final entry always ends at (or within a cent of) zero.
pub fn amortization_schedule(
    principal: f64,
    annual_rate: f64,
    years: u32,
    extra_payment: f64,
) -> Result<Vec<AmortizationEntry>> {
    ensure_non_negative("extra payment", extra_payment)?;
    let payment = monthly_payment(principal, annual_rate, years)?;
    let r = annual_rate / 100.0 / 12.0;
    let max_periods = years * 12 + SCHEDULE_GRACE_PERIODS;

    let mut schedule = Vec::new();
    let mut balance = principal;
    let mut cumulative_interest = 0.0;
    let mut payment_number = 1;

    while balance > 0.01 && payment_number <= max_periods {
        let mut interest = balance * r;
        let mut principal_paid = (payment + extra_payment - interest).min(balance);

        // Payment does not cover interest, or the grace window is exhausted.
        if principal_paid <= 0.0 || payment_number == max_periods {
            principal_paid = balance;
            interest = 0.0;
        }

        let beginning_balance = balance;
        balance -= principal_paid;
        cumulative_interest += interest;

        schedule.push(AmortizationEntry {
            payment_number,
            beginning_balance: round2(beginning_balance),
            payment_amount: round2(payment + extra_payment),
            principal: round2(principal_paid),
            interest: round2(interest),
            ending_balance: round2(balance.max(0.0)),
            cumulative_interest: round2(cumulative_interest),
        });

        payment_number += 1;
    }

    Ok(schedule)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffScenario {
    pub monthly_payment: f64,
    pub total_payments: u32,
    pub total_interest: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraPaymentScenario {
    pub extra_payment: f64,
    pub monthly_payment: f64,
    pub total_payments: u32,
    pub total_interest: f64,
    pub total_cost: f64,
    pub interest_saved: f64,
    pub months_saved: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffScenarios {
    pub minimum_payment: PayoffScenario,
    pub extra_50: ExtraPaymentScenario,
    pub extra_100: ExtraPaymentScenario,
    pub extra_200: ExtraPaymentScenario,
}

/// Compare the minimum schedule with $50, $100 and $200 of extra principal per month.
pub fn payoff_scenarios(principal: f64, annual_rate: f64, years: u32) -> Result<PayoffScenarios> {
    let payment = monthly_payment(principal, annual_rate, years)?;
    let minimum = summarize(principal, payment, &amortization_schedule(principal, annual_rate, years, 0.0)?);

    let extra = |amount: f64| -> Result<ExtraPaymentScenario> {
        let schedule = amortization_schedule(principal, annual_rate, years, amount)?;
        let scenario = summarize(principal, payment + amount, &schedule);
        Ok(ExtraPaymentScenario {
            extra_payment: amount,
            monthly_payment: round2(scenario.monthly_payment),
            total_payments: scenario.total_payments,
            total_interest: scenario.total_interest,
            total_cost: scenario.total_cost,
            interest_saved: round2(minimum.total_interest - scenario.total_interest),
            months_saved: minimum.total_payments as i64 - scenario.total_payments as i64,
        })
    };

    let [fifty, hundred, two_hundred] = EXTRA_PAYMENT_SCENARIOS;
    Ok(PayoffScenarios {
        extra_50: extra(fifty)?,
        extra_100: extra(hundred)?,
        extra_200: extra(two_hundred)?,
        minimum_payment: minimum,
    })
}

fn summarize(principal: f64, payment: f64, schedule: &[AmortizationEntry]) -> PayoffScenario {
    let total_interest = schedule.last().map(|e| e.cumulative_interest).unwrap_or(0.0);
    PayoffScenario {
        monthly_payment: payment,
        total_payments: schedule.len() as u32,
        total_interest,
        total_cost: round2(principal + total_interest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_payment_reference_value() {
        let payment = monthly_payment(10_000.0, 5.0, 10).unwrap();
        assert!((payment - 106.07).abs() < 0.005);
    }

    #[test]
    fn test_monthly_payment_zero_rate() {
        assert_eq!(monthly_payment(12_000.0, 0.0, 10).unwrap(), 100.0);
    }

    #[test]
    fn test_monthly_payment_rejects_bad_input() {
        assert!(monthly_payment(0.0, 5.0, 10).is_err());
        assert!(monthly_payment(1000.0, -1.0, 10).is_err());
        assert!(monthly_payment(1000.0, 5.0, 0).is_err());
    }

    #[test]
    fn test_schedule_pays_off_with_monotonic_interest() {
        for extra in [0.0, 75.0] {
            let schedule = amortization_schedule(25_000.0, 6.5, 5, extra).unwrap();
            let last = schedule.last().unwrap();
            assert!(last.ending_balance <= 0.01);
            assert!(schedule
                .windows(2)
                .all(|w| w[1].cumulative_interest >= w[0].cumulative_interest));
            assert!(schedule.len() <= 5 * 12 + 120);
        }
    }

    #[test]
    fn test_schedule_zero_rate_has_no_interest() {
        let schedule = amortization_schedule(1200.0, 0.0, 1, 0.0).unwrap();
        assert_eq!(schedule.len(), 12);
        assert_eq!(schedule.last().unwrap().cumulative_interest, 0.0);
    }

    #[test]
    fn test_payoff_scenarios_ordering() {
        let scenarios = payoff_scenarios(20_000.0, 7.0, 10).unwrap();
        let base = &scenarios.minimum_payment;
        let extras = [&scenarios.extra_50, &scenarios.extra_100, &scenarios.extra_200];

        for extra in extras {
            assert!(extra.total_payments <= base.total_payments);
            assert!(extra.total_interest <= base.total_interest);
            assert!(extra.interest_saved >= 0.0);
        }
        assert!(scenarios.extra_200.total_payments <= scenarios.extra_100.total_payments);
        assert!(scenarios.extra_100.total_payments <= scenarios.extra_50.total_payments);
        assert_eq!(base.total_cost, round2(20_000.0 + base.total_interest));
    }

    #[test]
    fn test_deterministic_output() {
        let a = amortization_schedule(15_000.0, 4.25, 3, 20.0).unwrap();
        let b = amortization_schedule(15_000.0, 4.25, 3, 20.0).unwrap();
        assert_eq!(a, b);
    }
}
