//! Composite financial health score (0 to 100)
//!
//! Budget (40) + debt (30) + emergency fund (20) + savings progress (10).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::profile::FinancialProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthGrade {
    A,
    B,
    C,
    D,
    F,
}

impl HealthGrade {
    pub fn from_score(score: u32) -> Self {
        match score {
            90.. => Self::A,
            80..=89 => Self::B,
            70..=79 => Self::C,
            60..=69 => Self::D,
            _ => Self::F,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::A => "Excellent",
            Self::B => "Good",
            Self::C => "Fair",
            Self::D => "Needs Improvement",
            Self::F => "Critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: u32,
    pub grade: HealthGrade,
    pub status: String,
    pub breakdown: BTreeMap<String, u32>,
    pub recommendations: Vec<String>,
    pub emergency_fund_months: f64,
}

pub fn enhanced_health_score(profile: &FinancialProfile) -> HealthScore {
    let income = profile.income.total();
    let expenses = profile.total_monthly_expenses();
    let mut recommendations = Vec::new();

    let budget = if income > 0.0 {
        let ratio = expenses / income;
        if ratio <= 0.5 {
            40
        } else if ratio <= 0.7 {
            recommendations.push("Your spending is manageable, but keep an eye on it.".to_string());
            30
        } else if ratio <= 1.0 {
            recommendations.push(
                "Your expenses are high relative to income. Consider reducing discretionary spending.".to_string(),
            );
            15
        } else {
            recommendations.push(
                "Critical: Your expenses exceed your income. Immediate budget review is required.".to_string(),
            );
            5
        }
    } else {
        recommendations.push("No income data provided. Please share your income information.".to_string());
        0
    };

    // Total debt against a year of income; neutral when income is unknown.
    let debt = if income > 0.0 {
        let ratio = profile.total_debt() / (income * 12.0);
        if ratio < 0.2 {
            30
        } else if ratio < 0.4 {
            20
        } else if ratio < 0.6 {
            recommendations.push("Your debt level is concerning. Focus on debt reduction strategies.".to_string());
            10
        } else {
            recommendations.push(
                "High debt burden detected. Consider debt consolidation or payment acceleration.".to_string(),
            );
            5
        }
    } else {
        15
    };

    let emergency_fund_months = if expenses > 0.0 {
        profile.emergency_fund() / expenses
    } else {
        0.0
    };
    let emergency = if emergency_fund_months >= 6.0 {
        20
    } else if emergency_fund_months >= 3.0 {
        15
    } else if emergency_fund_months >= 1.0 {
        recommendations.push("Build your emergency fund to cover 3-6 months of expenses.".to_string());
        10
    } else {
        recommendations.push("Priority: Start building an emergency fund immediately.".to_string());
        0
    };

    let savings = if profile.goals.is_empty() {
        recommendations.push("Set specific savings goals to improve your financial future.".to_string());
        0
    } else {
        let progress: f64 = profile
            .goals
            .values()
            .map(|g| if g.target > 0.0 { g.current / g.target } else { 0.0 })
            .sum::<f64>()
            / profile.goals.len() as f64;
        ((progress * 10.0).floor() as u32).min(10)
    };

    let score = budget + debt + emergency + savings;
    let grade = HealthGrade::from_score(score);

    let breakdown = BTreeMap::from([
        ("budget".to_string(), budget),
        ("debt".to_string(), debt),
        ("emergency".to_string(), emergency),
        ("savings".to_string(), savings),
    ]);

    HealthScore {
        score,
        grade,
        status: grade.status().to_string(),
        breakdown,
        recommendations,
        emergency_fund_months: super::round2(emergency_fund_months),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileUpdate;
    use chrono::Utc;

    fn profile(updates: Vec<ProfileUpdate>) -> FinancialProfile {
        let now = Utc::now();
        let mut profile = FinancialProfile::new(now);
        profile.apply_all(updates, now);
        profile
    }

    #[test]
    fn test_empty_profile_scores_neutral_debt_only() {
        let score = enhanced_health_score(&profile(vec![]));
        assert_eq!(score.score, 15);
        assert_eq!(score.breakdown["debt"], 15);
        assert_eq!(score.grade, HealthGrade::F);
        assert!(score.recommendations[0].starts_with("No income data provided"));
    }

    #[test]
    fn test_healthy_profile() {
        let score = enhanced_health_score(&profile(vec![
            ProfileUpdate::IncomeSource { source: "primary".into(), amount: 4000.0 },
            ProfileUpdate::RecurringExpense { category: "rent".into(), amount: 1500.0 },
            ProfileUpdate::DebtBalance { name: "car_loan".into(), balance: 5000.0 },
            ProfileUpdate::GoalTarget { name: "emergency_fund".into(), target: 9000.0 },
            ProfileUpdate::GoalProgress { name: "emergency_fund".into(), current: 9000.0 },
        ]));
        assert_eq!(score.breakdown["budget"], 40);
        assert_eq!(score.breakdown["debt"], 30);
        assert_eq!(score.breakdown["emergency"], 20);
        assert_eq!(score.breakdown["savings"], 10);
        assert_eq!(score.score, 100);
        assert_eq!(score.status, "Excellent");
    }

    #[test]
    fn test_score_is_sum_of_breakdown_and_bounded() {
        let score = enhanced_health_score(&profile(vec![
            ProfileUpdate::IncomeSource { source: "primary".into(), amount: 2000.0 },
            ProfileUpdate::RecurringExpense { category: "rent".into(), amount: 2500.0 },
            ProfileUpdate::DebtBalance { name: "credit_card".into(), balance: 30000.0 },
            ProfileUpdate::GoalTarget { name: "car".into(), target: 4000.0 },
        ]));
        assert_eq!(score.score, score.breakdown.values().sum::<u32>());
        assert!(score.score <= 100);
        assert_eq!(score.breakdown["budget"], 5);
        assert_eq!(score.breakdown["debt"], 5);
        assert_eq!(score.breakdown["emergency"], 0);
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(HealthGrade::from_score(90), HealthGrade::A);
        assert_eq!(HealthGrade::from_score(89), HealthGrade::B);
        assert_eq!(HealthGrade::from_score(70), HealthGrade::C);
        assert_eq!(HealthGrade::from_score(60), HealthGrade::D);
        assert_eq!(HealthGrade::from_score(59), HealthGrade::F);
    }
}
