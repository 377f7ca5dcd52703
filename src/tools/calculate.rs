//! calculate tool - Evaluate an arithmetic expression

use async_trait::async_trait;
use serde_json::{Value, json};

use super::expr::evaluate;
use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError};

pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &'static str {
        "calculate"
    }

    fn description(&self) -> &'static str {
        "Evaluate an arithmetic expression. Supports + - * /, parentheses, sqrt, sin, cos, tan, log and the constant e."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("expression", ParamKind::String, "Expression to evaluate, e.g. '2 + 3 * 4'").required(),
        ])
    }

    async fn execute(&self, args: &Arguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let expression = args.str("expression")?;
        let value = evaluate(expression).map_err(|e| ToolError::Evaluation(e.to_string()))?;

        Ok(json!({
            "expression": expression,
            "result": value.to_json(),
            "result_type": value.type_name(),
        }))
    }
}
