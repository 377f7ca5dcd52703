//! search_web tool - placeholder until a search backend is wired in

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError};

const MAX_RESULTS: u64 = 10;

pub struct SearchWebTool;

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &'static str {
        "search_web"
    }

    fn description(&self) -> &'static str {
        "Search the web for information"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("query", ParamKind::String, "Search query").required(),
            Parameter::new("num_results", ParamKind::Integer, "Number of results (default: 3)"),
        ])
    }

    async fn execute(&self, args: &Arguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let query = args.str("query")?.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".to_string()));
        }
        let requested = args.opt_u64("num_results").unwrap_or(3).clamp(1, MAX_RESULTS);

        let results = vec![json!({
            "title": format!("Search result for: {}", query),
            "url": "https://example.com/search",
            "snippet": format!("Placeholder result for '{}'.", query),
        })];

        Ok(json!({
            "query": query,
            "requested_results": requested,
            "total_results": results.len(),
            "results": results,
            "note": "No search backend is configured; results are placeholders.",
        }))
    }
}
