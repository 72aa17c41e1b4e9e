//! Compound growth and savings targets

use serde::{Deserialize, Serialize};

use super::{ensure_non_negative, ensure_positive, round2};
use crate::error::AgentError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureValue {
    pub future_value: f64,
    pub total_contributions: f64,
    pub total_interest: f64,
    /// Interest as a percentage of contributions.
    pub effective_rate: f64,
    pub monthly_contribution: f64,
    pub years: u32,
    pub annual_rate: f64,
}

/// Growth of a lump sum plus monthly contributions.
///
/// The principal compounds `compound_frequency` times a year; monthly
/// contributions compound at the equivalent monthly rate.
pub fn future_value(
    principal: f64,
    monthly_contribution: f64,
    annual_rate: f64,
    years: u32,
    compound_frequency: u32,
) -> Result<FutureValue> {
    ensure_non_negative("principal", principal)?;
    ensure_non_negative("monthly contribution", monthly_contribution)?;
    ensure_non_negative("annual rate", annual_rate)?;
    if compound_frequency == 0 {
        return Err(AgentError::Validation(
            "compound frequency must be at least 1".to_string(),
        ));
    }

    let frequency = compound_frequency as f64;
    let months = years as f64 * 12.0;
    let periodic_rate = annual_rate / 100.0 / frequency;

    let fv_principal = principal * (1.0 + periodic_rate).powf(years as f64 * frequency);
    let fv_contributions = if periodic_rate > 0.0 {
        let monthly_rate = (1.0 + periodic_rate).powf(frequency / 12.0) - 1.0;
        monthly_contribution * ((1.0 + monthly_rate).powf(months) - 1.0) / monthly_rate
    } else {
        monthly_contribution * months
    };

    let future_value = fv_principal + fv_contributions;
    let total_contributions = principal + monthly_contribution * months;
    let total_interest = future_value - total_contributions;
    let effective_rate = if total_contributions > 0.0 {
        total_interest / total_contributions * 100.0
    } else {
        0.0
    };

    Ok(FutureValue {
        future_value: round2(future_value),
        total_contributions: round2(total_contributions),
        total_interest: round2(total_interest),
        effective_rate: round2(effective_rate),
        monthly_contribution,
        years,
        annual_rate,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredSavings {
    pub required_monthly_savings: f64,
    pub target_amount: f64,
    pub years: u32,
    pub annual_rate: f64,
    pub total_contributions: f64,
}

/// Monthly deposit needed to reach `target` after `years` at a monthly-compounded rate.
pub fn required_monthly_savings(target: f64, years: u32, annual_rate: f64) -> Result<RequiredSavings> {
    ensure_positive("target amount", target)?;
    ensure_non_negative("annual rate", annual_rate)?;
    if years == 0 {
        return Err(AgentError::Validation("years must be greater than zero".to_string()));
    }

    let months = years as f64 * 12.0;
    let monthly_rate = annual_rate / 100.0 / 12.0;
    let required = if monthly_rate == 0.0 {
        target / months
    } else {
        target * monthly_rate / ((1.0 + monthly_rate).powf(months) - 1.0)
    };

    Ok(RequiredSavings {
        required_monthly_savings: round2(required),
        target_amount: target,
        years,
        annual_rate,
        total_contributions: round2(required * months),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsRequirement {
    pub goal_amount: f64,
    pub remaining_amount: f64,
    pub months: u32,
    pub required_monthly: f64,
    pub total_contribution: f64,
    /// Present when the caller supplied a planned monthly contribution.
    pub achievable: Option<bool>,
    /// Months needed at the planned contribution, when it is positive.
    pub alternative_months: Option<u32>,
}

/// Plain (no interest) plan to close the gap between savings and a goal.
pub fn savings_requirement(
    goal_amount: f64,
    months: u32,
    current_savings: f64,
    planned_monthly: Option<f64>,
) -> Result<SavingsRequirement> {
    ensure_positive("goal amount", goal_amount)?;
    ensure_non_negative("current savings", current_savings)?;
    if months == 0 {
        return Err(AgentError::Validation("months must be greater than zero".to_string()));
    }
    if let Some(planned) = planned_monthly {
        ensure_non_negative("monthly contribution", planned)?;
    }

    let remaining = (goal_amount - current_savings).max(0.0);
    let required_monthly = remaining / months as f64;

    let achievable = planned_monthly.map(|planned| planned >= required_monthly);
    let alternative_months = planned_monthly
        .filter(|planned| *planned > 0.0)
        .map(|planned| (remaining / planned).ceil() as u32);

    Ok(SavingsRequirement {
        goal_amount,
        remaining_amount: round2(remaining),
        months,
        required_monthly: round2(required_monthly),
        total_contribution: round2(remaining),
        achievable,
        alternative_months,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_no_contributions_returns_principal() {
        let fv = future_value(5000.0, 0.0, 0.0, 10, 12).unwrap();
        assert_eq!(fv.future_value, 5000.0);
        assert_eq!(fv.total_interest, 0.0);
    }

    #[test]
    fn test_zero_rate_equals_contributions() {
        let fv = future_value(1000.0, 250.0, 0.0, 3, 4).unwrap();
        assert_eq!(fv.future_value, fv.total_contributions);
        assert_eq!(fv.total_contributions, 1000.0 + 250.0 * 36.0);
    }

    #[test]
    fn test_positive_rate_grows() {
        let fv = future_value(10_000.0, 200.0, 7.0, 20, 12).unwrap();
        assert!(fv.future_value > fv.total_contributions);
        assert!(fv.effective_rate > 0.0);
    }

    #[test]
    fn test_zero_contributions_effective_rate_is_zero() {
        let fv = future_value(0.0, 0.0, 5.0, 10, 12).unwrap();
        assert_eq!(fv.effective_rate, 0.0);
    }

    #[test]
    fn test_required_savings_zero_rate() {
        let result = required_monthly_savings(12_000.0, 2, 0.0).unwrap();
        assert_eq!(result.required_monthly_savings, 500.0);
    }

    #[test]
    fn test_required_savings_reaches_target() {
        let result = required_monthly_savings(50_000.0, 5, 4.0).unwrap();
        let fv = future_value(0.0, result.required_monthly_savings, 4.0, 5, 12).unwrap();
        assert!((fv.future_value - 50_000.0).abs() < 5.0);
    }

    #[test]
    fn test_savings_requirement_plan() {
        let plan = savings_requirement(3000.0, 10, 500.0, Some(200.0)).unwrap();
        assert_eq!(plan.required_monthly, 250.0);
        assert_eq!(plan.achievable, Some(false));
        assert_eq!(plan.alternative_months, Some(13));

        let done = savings_requirement(1000.0, 6, 1500.0, None).unwrap();
        assert_eq!(done.required_monthly, 0.0);
        assert_eq!(done.achievable, None);
    }
}
