//! Tool trait and registry
//!
//! Tools wrap the deterministic calculators behind a typed contract. Each
//! tool declares JSON schemas for its input and output; the registry
//! compiles them once at registration and checks every call against them
//! before and after execution.

pub mod finance;
pub mod planning;
pub mod utility;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::AgentError;
use crate::export::BudgetExporter;
use crate::Result;

/// A single typed tool.
///
/// Inputs arrive as JSON, are checked against `input_schema`, deserialized
/// into `Input`, then passed through `validate` before `run` is called.
#[async_trait::async_trait]
pub trait Tool: Send + Sync + 'static {
    type Input: DeserializeOwned + Send + 'static;
    type Output: Serialize + Send + 'static;

    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    fn output_schema(&self) -> Value;

    /// Semantic preconditions the schema cannot express.
    fn validate(&self, _input: &Self::Input) -> Result<()> {
        Ok(())
    }

    async fn run(&self, input: Self::Input) -> Result<Self::Output>;
}

/// Object-safe view of a [`Tool`], used inside the registry.
#[async_trait::async_trait]
trait DynTool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    async fn call(&self, args: Value) -> Result<Value>;
}

#[async_trait::async_trait]
impl<T: Tool> DynTool for T {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            output_schema: self.output_schema(),
        }
    }

    async fn call(&self, args: Value) -> Result<Value> {
        let name = self.name();

        let input: T::Input = serde_json::from_value(args)
            .map_err(|e| AgentError::invalid_arguments(name, e.to_string()))?;

        self.validate(&input)
            .map_err(|e| AgentError::invalid_arguments(name, e.user_message()))?;

        let output = self.run(input).await.map_err(|e| match e {
            AgentError::ToolExecution { .. } => e,
            other => AgentError::tool_execution(name, other.user_message()),
        })?;

        serde_json::to_value(output).map_err(|e| AgentError::tool_execution(name, e.to_string()))
    }
}

/// Model- and client-facing description of a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// Successful tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub output: Value,
    pub execution_time: Duration,
}

struct RegisteredTool {
    tool: Arc<dyn DynTool>,
    descriptor: ToolDescriptor,
    input_validator: Arc<jsonschema::Validator>,
    output_validator: Arc<jsonschema::Validator>,
}

/// Tool registry for looking up and executing tools.
///
/// Built once at startup and shared read-only.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, compiling its schemas. Fails on a duplicate name or a malformed schema.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<()> {
        let descriptor = DynTool::descriptor(&tool);
        if self.tools.contains_key(&descriptor.name) {
            return Err(AgentError::InvalidToolSchema {
                tool_name: descriptor.name,
                message: "a tool with this name is already registered".to_string(),
            });
        }

        let compile = |schema: &Value, which: &str| {
            jsonschema::validator_for(schema).map_err(|e| AgentError::InvalidToolSchema {
                tool_name: descriptor.name.clone(),
                message: format!("{} schema: {}", which, e),
            })
        };
        let input_validator = Arc::new(compile(&descriptor.input_schema, "input")?);
        let output_validator = Arc::new(compile(&descriptor.output_schema, "output")?);

        debug!(tool_name = %descriptor.name, "Registered tool");

        self.tools.insert(
            descriptor.name.clone(),
            RegisteredTool {
                tool: Arc::new(tool),
                descriptor,
                input_validator,
                output_validator,
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in alphabetical order.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Descriptors in alphabetical order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// Validate and run a tool.
    ///
    /// Unknown names and schema violations are rejected before the tool runs.
    pub async fn execute_tool(&self, name: &str, args: Value) -> Result<ToolOutcome> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;

        if let Some(message) = schema_errors(&entry.input_validator, &args) {
            return Err(AgentError::invalid_arguments(name, message));
        }

        let started = Instant::now();
        let output = entry.tool.call(args).await?;
        let execution_time = started.elapsed();

        if let Some(message) = schema_errors(&entry.output_validator, &output) {
            warn!(tool_name = %name, %message, "Tool output violated its schema");
            return Err(AgentError::tool_execution(
                name,
                format!("output did not match the declared schema: {}", message),
            ));
        }

        debug!(tool_name = %name, elapsed_ms = execution_time.as_millis() as u64, "Tool executed");

        Ok(ToolOutcome {
            output,
            execution_time,
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn schema_errors(validator: &jsonschema::Validator, value: &Value) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

/// Accepts `12` and `12.0` for integer fields; models often emit whole numbers as floats.
pub(crate) fn whole_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(D::Error::custom(format!("expected a whole number, got {}", value)));
    }
    Ok(value as u32)
}

/// Create the registry with every built-in tool.
pub fn create_default_registry(
    clock: Arc<dyn Clock>,
    exporter: Arc<dyn BudgetExporter>,
) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    // Calculators
    registry.register(finance::LoanPaymentTool)?;
    registry.register(finance::AmortizationScheduleTool)?;
    registry.register(finance::CompoundInterestTool)?;
    registry.register(finance::RequiredSavingsTool)?;
    registry.register(finance::SavingsRequirementTool)?;
    registry.register(finance::DebtPayoffTool)?;
    registry.register(finance::InvestmentRecommendationTool)?;

    // Planning
    registry.register(planning::BudgetTemplateTool::new(clock.clone()))?;
    registry.register(planning::HealthScoreTool::new(clock.clone()))?;
    registry.register(planning::BudgetSheetTool::new(exporter, clock.clone()))?;

    // Utilities
    registry.register(utility::CurrentDateTimeTool::new(clock))?;
    registry.register(utility::GeneralInfoTool)?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::export::CsvBudgetExporter;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_registry() -> ToolRegistry {
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()));
        let exporter = Arc::new(CsvBudgetExporter::new(std::env::temp_dir().join("finlit_tool_tests")));
        create_default_registry(clock, exporter).unwrap()
    }

    struct CountingTool {
        runs: Arc<AtomicUsize>,
    }

    #[derive(Deserialize)]
    struct CountingInput {
        amount: f64,
    }

    #[async_trait::async_trait]
    impl Tool for CountingTool {
        type Input = CountingInput;
        type Output = Value;

        fn name(&self) -> &'static str {
            "counting"
        }
        fn description(&self) -> &'static str {
            "Counts invocations"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"amount": {"type": "number"}}, "required": ["amount"]})
        }
        fn output_schema(&self) -> Value {
            json!({"type": "object", "required": ["doubled"]})
        }
        fn validate(&self, input: &Self::Input) -> Result<()> {
            if input.amount < 0.0 {
                return Err(AgentError::Validation("amount must not be negative".into()));
            }
            Ok(())
        }
        async fn run(&self, input: Self::Input) -> Result<Value> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if input.amount == 13.0 {
                return Ok(json!({"wrong": true}));
            }
            Ok(json!({"doubled": input.amount * 2.0}))
        }
    }

    fn counting_registry() -> (ToolRegistry, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool { runs: runs.clone() }).unwrap();
        (registry, runs)
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (registry, runs) = counting_registry();
        let err = registry.execute_tool("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "missing"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schema_violation_rejected_before_run() {
        let (registry, runs) = counting_registry();
        let err = registry
            .execute_tool("counting", json!({"amount": "ten"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments { .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_precondition_rejected_before_run() {
        let (registry, runs) = counting_registry();
        let err = registry
            .execute_tool("counting", json!({"amount": -1.0}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments { ref message, .. } if message.contains("negative")));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_execution_is_timed() {
        let (registry, runs) = counting_registry();
        let outcome = registry.execute_tool("counting", json!({"amount": 2.5})).await.unwrap();
        assert_eq!(outcome.output, json!({"doubled": 5.0}));
        assert!(outcome.execution_time < Duration::from_secs(1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_output_schema_enforced() {
        let (registry, _) = counting_registry();
        let err = registry
            .execute_tool("counting", json!({"amount": 13.0}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution { .. }));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (mut registry, runs) = counting_registry();
        assert!(registry.register(CountingTool { runs }).is_err());
    }

    #[test]
    fn test_default_registry_lists_all_tools() {
        let registry = test_registry();
        let names = registry.list();
        for expected in [
            "calculate_loan_payment",
            "generate_amortization_schedule",
            "calculate_compound_interest",
            "calculate_required_savings",
            "calculate_savings_requirement",
            "simulate_debt_payoff",
            "get_investment_recommendations",
            "generate_budget_template",
            "calculate_financial_health_score",
            "generate_budget_sheet",
            "get_current_datetime",
            "get_general_info",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert_eq!(registry.descriptors().len(), names.len());
    }
}
