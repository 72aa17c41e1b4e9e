//! Calculator-backed tools: loans, growth, savings, debt and investing

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{whole_number, Tool};
use crate::calculators::{
    self, amortization_schedule, ensure_non_negative, ensure_positive, future_value, monthly_payment,
    payoff_scenarios, required_monthly_savings, round2, savings_requirement, simulate_debt_payoff,
    AmortizationEntry, DebtPayoffSimulation, FutureValue, InvestmentPlan, PayoffScenarios,
    RequiredSavings, SavingsRequirement,
};
use crate::error::AgentError;
use crate::profile::{InvestmentExperience, RiskTolerance};
use crate::Result;

fn ensure_years(years: u32) -> Result<()> {
    if years == 0 || years > 100 {
        return Err(AgentError::Validation("years must be between 1 and 100".to_string()));
    }
    Ok(())
}

// ===== Loan payment =====

#[derive(Debug, Deserialize)]
pub struct LoanInput {
    pub principal: f64,
    pub annual_rate: f64,
    #[serde(deserialize_with = "whole_number")]
    pub years: u32,
}

#[derive(Debug, Serialize)]
pub struct LoanOutput {
    pub monthly_payment: f64,
    pub total_cost: f64,
    pub total_interest: f64,
    pub payoff_scenarios: PayoffScenarios,
}

pub struct LoanPaymentTool;

#[async_trait::async_trait]
impl Tool for LoanPaymentTool {
    type Input = LoanInput;
    type Output = LoanOutput;

    fn name(&self) -> &'static str {
        "calculate_loan_payment"
    }

    fn description(&self) -> &'static str {
        "Calculate the fixed monthly payment, total cost and total interest of a loan, with payoff comparisons for extra monthly payments."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "principal": {"type": "number", "description": "Loan amount in dollars"},
                "annual_rate": {"type": "number", "description": "Annual interest rate in percent, e.g. 5.5"},
                "years": {"type": "integer", "description": "Loan term in years"}
            },
            "required": ["principal", "annual_rate", "years"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "monthly_payment": {"type": "number"},
                "total_cost": {"type": "number"},
                "total_interest": {"type": "number"},
                "payoff_scenarios": {"type": "object"}
            },
            "required": ["monthly_payment", "total_cost", "total_interest", "payoff_scenarios"]
        })
    }

    fn validate(&self, input: &LoanInput) -> Result<()> {
        ensure_positive("principal", input.principal)?;
        ensure_non_negative("annual rate", input.annual_rate)?;
        ensure_years(input.years)
    }

    async fn run(&self, input: LoanInput) -> Result<LoanOutput> {
        let payment = monthly_payment(input.principal, input.annual_rate, input.years)?;
        let total_cost = round2(payment * input.years as f64 * 12.0);
        Ok(LoanOutput {
            monthly_payment: payment,
            total_cost,
            total_interest: round2(total_cost - input.principal),
            payoff_scenarios: payoff_scenarios(input.principal, input.annual_rate, input.years)?,
        })
    }
}

// ===== Amortization schedule =====

#[derive(Debug, Deserialize)]
pub struct AmortizationInput {
    pub principal: f64,
    pub annual_rate: f64,
    #[serde(deserialize_with = "whole_number")]
    pub years: u32,
    #[serde(default)]
    pub extra_payment: f64,
    #[serde(default = "default_max_rows", deserialize_with = "whole_number")]
    pub max_rows: u32,
}

fn default_max_rows() -> u32 {
    24
}

#[derive(Debug, Serialize)]
pub struct AmortizationOutput {
    pub monthly_payment: f64,
    pub total_payments: u32,
    pub total_interest: f64,
    pub schedule: Vec<AmortizationEntry>,
    pub truncated: bool,
}

pub struct AmortizationScheduleTool;

#[async_trait::async_trait]
impl Tool for AmortizationScheduleTool {
    type Input = AmortizationInput;
    type Output = AmortizationOutput;

    fn name(&self) -> &'static str {
        "generate_amortization_schedule"
    }

    fn description(&self) -> &'static str {
        "Generate a month-by-month amortization schedule for a loan, optionally with an extra monthly principal payment."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "principal": {"type": "number"},
                "annual_rate": {"type": "number", "description": "Annual interest rate in percent"},
                "years": {"type": "integer"},
                "extra_payment": {"type": "number", "description": "Extra principal paid each month"},
                "max_rows": {"type": "integer", "description": "Maximum schedule rows to return (default 24)"}
            },
            "required": ["principal", "annual_rate", "years"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["monthly_payment", "total_payments", "total_interest", "schedule", "truncated"]
        })
    }

    fn validate(&self, input: &AmortizationInput) -> Result<()> {
        ensure_positive("principal", input.principal)?;
        ensure_non_negative("annual rate", input.annual_rate)?;
        ensure_non_negative("extra payment", input.extra_payment)?;
        ensure_years(input.years)
    }

    async fn run(&self, input: AmortizationInput) -> Result<AmortizationOutput> {
        let payment = monthly_payment(input.principal, input.annual_rate, input.years)?;
        let mut schedule =
            amortization_schedule(input.principal, input.annual_rate, input.years, input.extra_payment)?;

        let total_payments = schedule.len() as u32;
        let total_interest = schedule.last().map(|e| e.cumulative_interest).unwrap_or(0.0);
        let limit = input.max_rows.max(1) as usize;
        let truncated = schedule.len() > limit;
        schedule.truncate(limit);

        Ok(AmortizationOutput {
            monthly_payment: payment,
            total_payments,
            total_interest,
            schedule,
            truncated,
        })
    }
}

// ===== Compound interest =====

#[derive(Debug, Deserialize)]
pub struct CompoundInterestInput {
    pub principal: f64,
    #[serde(default)]
    pub monthly_contribution: f64,
    pub annual_rate: f64,
    #[serde(deserialize_with = "whole_number")]
    pub years: u32,
    #[serde(default = "default_compound_frequency", deserialize_with = "whole_number")]
    pub compound_frequency: u32,
}

fn default_compound_frequency() -> u32 {
    12
}

pub struct CompoundInterestTool;

#[async_trait::async_trait]
impl Tool for CompoundInterestTool {
    type Input = CompoundInterestInput;
    type Output = FutureValue;

    fn name(&self) -> &'static str {
        "calculate_compound_interest"
    }

    fn description(&self) -> &'static str {
        "Project the future value of savings with compound interest and optional monthly contributions."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "principal": {"type": "number", "description": "Starting balance"},
                "monthly_contribution": {"type": "number"},
                "annual_rate": {"type": "number", "description": "Annual interest rate in percent"},
                "years": {"type": "integer"},
                "compound_frequency": {"type": "integer", "description": "Compounding periods per year (default 12)"}
            },
            "required": ["principal", "annual_rate", "years"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["future_value", "total_contributions", "total_interest", "effective_rate"]
        })
    }

    fn validate(&self, input: &CompoundInterestInput) -> Result<()> {
        ensure_non_negative("principal", input.principal)?;
        ensure_non_negative("monthly contribution", input.monthly_contribution)?;
        ensure_non_negative("annual rate", input.annual_rate)?;
        ensure_years(input.years)?;
        if input.compound_frequency == 0 || input.compound_frequency > 365 {
            return Err(AgentError::Validation(
                "compound frequency must be between 1 and 365".to_string(),
            ));
        }
        Ok(())
    }

    async fn run(&self, input: CompoundInterestInput) -> Result<FutureValue> {
        future_value(
            input.principal,
            input.monthly_contribution,
            input.annual_rate,
            input.years,
            input.compound_frequency,
        )
    }
}

// ===== Savings targets =====

#[derive(Debug, Deserialize)]
pub struct RequiredSavingsInput {
    pub target_amount: f64,
    #[serde(deserialize_with = "whole_number")]
    pub years: u32,
    #[serde(default)]
    pub annual_rate: f64,
}

pub struct RequiredSavingsTool;

#[async_trait::async_trait]
impl Tool for RequiredSavingsTool {
    type Input = RequiredSavingsInput;
    type Output = RequiredSavings;

    fn name(&self) -> &'static str {
        "calculate_required_savings"
    }

    fn description(&self) -> &'static str {
        "Calculate the monthly deposit needed to reach a target amount in a number of years at a given interest rate."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_amount": {"type": "number"},
                "years": {"type": "integer"},
                "annual_rate": {"type": "number", "description": "Expected annual return in percent (default 0)"}
            },
            "required": ["target_amount", "years"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["required_monthly_savings", "target_amount", "total_contributions"]
        })
    }

    fn validate(&self, input: &RequiredSavingsInput) -> Result<()> {
        ensure_positive("target amount", input.target_amount)?;
        ensure_non_negative("annual rate", input.annual_rate)?;
        ensure_years(input.years)
    }

    async fn run(&self, input: RequiredSavingsInput) -> Result<RequiredSavings> {
        required_monthly_savings(input.target_amount, input.years, input.annual_rate)
    }
}

#[derive(Debug, Deserialize)]
pub struct SavingsRequirementInput {
    pub goal_amount: f64,
    #[serde(deserialize_with = "whole_number")]
    pub months: u32,
    #[serde(default)]
    pub current_savings: f64,
    #[serde(default)]
    pub monthly_contribution: Option<f64>,
}

pub struct SavingsRequirementTool;

#[async_trait::async_trait]
impl Tool for SavingsRequirementTool {
    type Input = SavingsRequirementInput;
    type Output = SavingsRequirement;

    fn name(&self) -> &'static str {
        "calculate_savings_requirement"
    }

    fn description(&self) -> &'static str {
        "Work out how much to save each month to reach a savings goal by a deadline, and whether a planned contribution is enough."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "goal_amount": {"type": "number"},
                "months": {"type": "integer"},
                "current_savings": {"type": "number"},
                "monthly_contribution": {"type": "number", "description": "Planned monthly contribution, if known"}
            },
            "required": ["goal_amount", "months"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["required_monthly", "total_contribution", "remaining_amount"]
        })
    }

    fn validate(&self, input: &SavingsRequirementInput) -> Result<()> {
        ensure_positive("goal amount", input.goal_amount)?;
        ensure_non_negative("current savings", input.current_savings)?;
        if input.months == 0 {
            return Err(AgentError::Validation("months must be greater than zero".to_string()));
        }
        Ok(())
    }

    async fn run(&self, input: SavingsRequirementInput) -> Result<SavingsRequirement> {
        savings_requirement(
            input.goal_amount,
            input.months,
            input.current_savings,
            input.monthly_contribution,
        )
    }
}

// ===== Debt payoff =====

#[derive(Debug, Deserialize)]
pub struct DebtPayoffInput {
    pub debt_balance: f64,
    pub interest_rate: f64,
    pub current_payment: f64,
    #[serde(default)]
    pub extra_payment: f64,
    #[serde(default = "default_debt_type")]
    pub debt_type: String,
}

fn default_debt_type() -> String {
    "debt".to_string()
}

pub struct DebtPayoffTool;

#[async_trait::async_trait]
impl Tool for DebtPayoffTool {
    type Input = DebtPayoffInput;
    type Output = DebtPayoffSimulation;

    fn name(&self) -> &'static str {
        "simulate_debt_payoff"
    }

    fn description(&self) -> &'static str {
        "Compare how long a debt takes to pay off at the current payment versus with an extra monthly payment, and the interest saved."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "debt_balance": {"type": "number"},
                "interest_rate": {"type": "number", "description": "Annual interest rate in percent"},
                "current_payment": {"type": "number", "description": "Current monthly payment"},
                "extra_payment": {"type": "number", "description": "Additional monthly payment"},
                "debt_type": {"type": "string"}
            },
            "required": ["debt_balance", "interest_rate", "current_payment"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["original_payoff", "new_payoff", "total_interest_saved", "monthly_savings"]
        })
    }

    fn validate(&self, input: &DebtPayoffInput) -> Result<()> {
        ensure_positive("debt balance", input.debt_balance)?;
        ensure_non_negative("interest rate", input.interest_rate)?;
        ensure_positive("current payment", input.current_payment)?;
        ensure_non_negative("extra payment", input.extra_payment)
    }

    async fn run(&self, input: DebtPayoffInput) -> Result<DebtPayoffSimulation> {
        simulate_debt_payoff(
            input.debt_balance,
            input.interest_rate,
            input.current_payment,
            input.extra_payment,
            &input.debt_type,
        )
    }
}

// ===== Investing =====

#[derive(Debug, Deserialize)]
pub struct InvestmentInput {
    #[serde(deserialize_with = "whole_number")]
    pub age: u32,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    #[serde(default)]
    pub investment_experience: InvestmentExperience,
}

pub struct InvestmentRecommendationTool;

#[async_trait::async_trait]
impl Tool for InvestmentRecommendationTool {
    type Input = InvestmentInput;
    type Output = InvestmentPlan;

    fn name(&self) -> &'static str {
        "get_investment_recommendations"
    }

    fn description(&self) -> &'static str {
        "Suggest an educational bonds/stocks/cash allocation based on age, risk tolerance and investing experience."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "age": {"type": "integer"},
                "risk_tolerance": {"type": "string", "enum": ["conservative", "moderate", "aggressive"]},
                "investment_experience": {"type": "string", "enum": ["beginner", "intermediate", "advanced"]}
            },
            "required": ["age"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["allocation", "expected_annual_return", "recommendations"]
        })
    }

    fn validate(&self, input: &InvestmentInput) -> Result<()> {
        if !(16..=100).contains(&input.age) {
            return Err(AgentError::Validation("age must be between 16 and 100".to_string()));
        }
        Ok(())
    }

    async fn run(&self, input: InvestmentInput) -> Result<InvestmentPlan> {
        calculators::investment_allocation(input.age, input.risk_tolerance, input.investment_experience)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(LoanPaymentTool).unwrap();
        registry.register(AmortizationScheduleTool).unwrap();
        registry.register(DebtPayoffTool).unwrap();
        registry.register(CompoundInterestTool).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_loan_payment_tool() {
        let outcome = registry()
            .execute_tool(
                "calculate_loan_payment",
                json!({"principal": 10000, "annual_rate": 5, "years": 10}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.output["monthly_payment"], json!(106.07));
        assert!(outcome.output["payoff_scenarios"]["extra_100"]["months_saved"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_loan_payment_accepts_float_years() {
        let outcome = registry()
            .execute_tool(
                "calculate_loan_payment",
                json!({"principal": 12000.0, "annual_rate": 0.0, "years": 10.0}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.output["monthly_payment"], json!(100.0));
    }

    #[tokio::test]
    async fn test_loan_payment_rejects_zero_principal() {
        let err = registry()
            .execute_tool(
                "calculate_loan_payment",
                json!({"principal": 0, "annual_rate": 5, "years": 10}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_amortization_truncates_rows() {
        let outcome = registry()
            .execute_tool(
                "generate_amortization_schedule",
                json!({"principal": 5000, "annual_rate": 6, "years": 3, "max_rows": 6}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.output["schedule"].as_array().unwrap().len(), 6);
        assert_eq!(outcome.output["truncated"], json!(true));
        assert!(outcome.output["total_payments"].as_u64().unwrap() >= 36);
    }

    #[tokio::test]
    async fn test_debt_payoff_missing_field() {
        let err = registry()
            .execute_tool("simulate_debt_payoff", json!({"debt_balance": 1000}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_compound_interest_defaults() {
        let outcome = registry()
            .execute_tool(
                "calculate_compound_interest",
                json!({"principal": 5000, "annual_rate": 0, "years": 10}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.output["future_value"], json!(5000.0));
    }
}
