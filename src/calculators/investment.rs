//! Age and risk based asset allocation

use serde::{Deserialize, Serialize};

use super::round2;
use crate::error::AgentError;
use crate::profile::{InvestmentExperience, RiskTolerance};
use crate::Result;

const BOND_RETURN: f64 = 0.04;
const STOCK_RETURN: f64 = 0.08;
const CASH_RETURN: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub bonds: f64,
    pub stocks: f64,
    pub cash: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPlan {
    pub age: u32,
    pub risk_tolerance: RiskTolerance,
    pub experience: InvestmentExperience,
    /// Fractions of the portfolio, summing to 1.
    pub allocation: Allocation,
    /// Expected annual return in percent.
    pub expected_annual_return: f64,
    pub recommendations: Vec<String>,
}

fn base_allocation(risk: RiskTolerance) -> Allocation {
    match risk {
        RiskTolerance::Conservative => Allocation { bonds: 0.6, stocks: 0.3, cash: 0.1 },
        RiskTolerance::Moderate => Allocation { bonds: 0.4, stocks: 0.5, cash: 0.1 },
        RiskTolerance::Aggressive => Allocation { bonds: 0.2, stocks: 0.7, cash: 0.1 },
    }
}

fn experience_advice(experience: InvestmentExperience) -> Vec<String> {
    let advice: &[&str] = match experience {
        InvestmentExperience::Beginner => &[
            "Start with low-cost index funds or ETFs",
            "Consider target-date funds for simplicity",
            "Learn the basics before picking individual stocks",
            "Keep investing consistently, even in small amounts",
        ],
        InvestmentExperience::Intermediate => &[
            "Diversify across domestic and international funds",
            "Rebalance your portfolio at least once a year",
            "Use tax-advantaged accounts before taxable ones",
        ],
        InvestmentExperience::Advanced => &[
            "Review asset location across taxable and tax-advantaged accounts",
            "Consider factor tilts or alternative assets in moderation",
            "Keep position sizes within your risk limits",
        ],
    };
    advice.iter().map(|s| s.to_string()).collect()
}

/// The base bond share is scaled by `max(0.1, 1 - (age - 25) / 100)` and
/// capped at 80%; stocks take whatever bonds and cash leave.
pub fn investment_allocation(
    age: u32,
    risk_tolerance: RiskTolerance,
    experience: InvestmentExperience,
) -> Result<InvestmentPlan> {
    if !(16..=100).contains(&age) {
        return Err(AgentError::Validation("age must be between 16 and 100".to_string()));
    }

    let base = base_allocation(risk_tolerance);
    let age_factor = (1.0 - (age as f64 - 25.0) / 100.0).max(0.1);
    let bonds = (base.bonds * age_factor).min(0.8);
    let cash = base.cash;
    let stocks = 1.0 - bonds - cash;

    let expected = bonds * BOND_RETURN + stocks * STOCK_RETURN + cash * CASH_RETURN;

    Ok(InvestmentPlan {
        age,
        risk_tolerance,
        experience,
        allocation: Allocation {
            bonds: round2(bonds),
            stocks: round2(stocks),
            cash: round2(cash),
        },
        expected_annual_return: round2(expected * 100.0),
        recommendations: experience_advice(experience),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_sums_to_one() {
        for risk in [RiskTolerance::Conservative, RiskTolerance::Moderate, RiskTolerance::Aggressive] {
            let plan = investment_allocation(40, risk, InvestmentExperience::Beginner).unwrap();
            let a = plan.allocation;
            assert!((a.bonds + a.stocks + a.cash - 1.0).abs() < 0.011);
        }
    }

    #[test]
    fn test_age_scaled_moderate_plan() {
        let plan = investment_allocation(45, RiskTolerance::Moderate, InvestmentExperience::Intermediate).unwrap();
        assert_eq!(plan.allocation.bonds, 0.32);
        assert_eq!(plan.allocation.stocks, 0.58);
        assert_eq!(plan.allocation.cash, 0.1);
        assert_eq!(plan.expected_annual_return, 6.12);
        assert_eq!(plan.recommendations.len(), 3);
    }

    #[test]
    fn test_age_bounds() {
        assert!(investment_allocation(10, RiskTolerance::Moderate, InvestmentExperience::Beginner).is_err());
    }
}
