//! Tool registry - the read-only dispatch table
//!
//! Built once with `ToolRegistryBuilder` and never mutated afterwards, so a
//! single `Arc<ToolRegistry>` can serve concurrent runs without locking.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::{
    CalculateTool, CurrentTimeTool, ExecuteCommandTool, ListFilesTool, ParameterSchema, ProcessListTool, ReadFileTool,
    SearchWebTool, SystemInfoTool, Tool, ToolContext, ToolError, ToolResult, WeatherTool, WriteFileTool,
};
use crate::llm::ToolDefinition;

/// Public description of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDescriptor {
    /// The shape sent to the inference endpoint
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.parameters.to_json_schema())
    }
}

/// Collects tools before the registry is frozen
pub struct ToolRegistryBuilder {
    tools: IndexMap<String, Arc<dyn Tool>>,
    ctx: ToolContext,
}

impl ToolRegistryBuilder {
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            tools: IndexMap::new(),
            ctx,
        }
    }

    /// Add a tool; a later tool with the same name replaces the earlier one in place
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        self
    }

    pub fn build(self) -> ToolRegistry {
        debug!("Tool registry built with {} tools", self.tools.len());
        ToolRegistry {
            tools: self.tools,
            ctx: self.ctx,
        }
    }
}

/// Name-keyed, insertion-ordered tool table
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
    ctx: ToolContext,
}

impl ToolRegistry {
    pub fn builder(ctx: ToolContext) -> ToolRegistryBuilder {
        ToolRegistryBuilder::new(ctx)
    }

    /// Registry with every built-in tool
    pub fn standard(ctx: ToolContext) -> Self {
        Self::builder(ctx)
            .register(WeatherTool)
            .register(SystemInfoTool)
            .register(ListFilesTool)
            .register(ReadFileTool)
            .register(WriteFileTool)
            .register(ExecuteCommandTool)
            .register(CalculateTool)
            .register(CurrentTimeTool)
            .register(SearchWebTool)
            .register(ProcessListTool)
            .build()
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Describe all tools, or only the named ones
    ///
    /// Order is always registration order; unknown filter names are ignored.
    pub fn list_descriptors(&self, filter: Option<&[String]>) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .filter(|tool| filter.is_none_or(|names| names.iter().any(|n| n == tool.name())))
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// `{total, tools: [...]}` listing of every tool
    pub fn catalog(&self) -> Value {
        let tools: Vec<Value> = self
            .list_descriptors(None)
            .into_iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "description": d.description,
                    "parameters": d.parameters.to_json_schema(),
                })
            })
            .collect();

        json!({
            "total": tools.len(),
            "tools": tools,
        })
    }

    /// Run a tool by name
    ///
    /// Never fails: unknown names, bad arguments, executor errors and panics
    /// all come back as `ToolResult::Failure`.
    pub async fn execute(&self, name: &str, arguments: Map<String, Value>) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            warn!("Model requested unknown tool '{}'", name);
            return ToolResult::failure(ToolError::UnknownTool { name: name.to_string() }.to_string());
        };

        let args = match tool.parameters().validate(arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!("Tool '{}' rejected arguments: {}", name, e);
                return ToolResult::failure(e.to_string());
            }
        };

        let outcome = AssertUnwindSafe(tool.execute(&args, &self.ctx)).catch_unwind().await;

        match outcome {
            Ok(Ok(payload)) => {
                info!("Tool executed: {}", name);
                ToolResult::success(payload)
            }
            Ok(Err(e)) => {
                warn!("Tool '{}' failed: {}", name, e);
                ToolResult::failure(e.to_string())
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!("Tool '{}' panicked: {}", name, message);
                ToolResult::failure(ToolError::Panicked(message).to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .field("ctx", &self.ctx)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Arguments, ParamKind, Parameter};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo the text back"
        }

        fn parameters(&self) -> ParameterSchema {
            ParameterSchema::new(vec![Parameter::new("text", ParamKind::String, "Text").required()])
        }

        async fn execute(&self, args: &Arguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
            Ok(json!({"text": args.str("text")?}))
        }
    }

    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn name(&self) -> &'static str {
            "panic"
        }

        fn description(&self) -> &'static str {
            "Always panics"
        }

        fn parameters(&self) -> ParameterSchema {
            ParameterSchema::empty()
        }

        async fn execute(&self, _args: &Arguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
            panic!("executor exploded");
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::builder(ToolContext::new("/tmp"))
            .register(EchoTool)
            .register(PanicTool)
            .build()
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_standard_registry_order() {
        let registry = ToolRegistry::standard(ToolContext::new("/tmp"));
        assert_eq!(
            registry.tool_names(),
            vec![
                "get_weather",
                "get_system_info",
                "list_files",
                "read_file",
                "write_file",
                "execute_command",
                "calculate",
                "get_current_time",
                "search_web",
                "get_process_list",
            ]
        );
    }

    #[test]
    fn test_list_descriptors_filter() {
        let registry = ToolRegistry::standard(ToolContext::new("/tmp"));
        let filter = vec!["read_file".to_string(), "nope".to_string(), "calculate".to_string()];
        let descriptors = registry.list_descriptors(Some(&filter));

        let names: Vec<_> = descriptors.iter().map(|d| d.name.as_str()).collect();
        // Registration order, not filter order; unknown names dropped
        assert_eq!(names, vec!["read_file", "calculate"]);
    }

    #[test]
    fn test_list_descriptors_all() {
        let registry = registry();
        assert_eq!(registry.list_descriptors(None).len(), 2);
        assert!(registry.list_descriptors(Some(&[])).is_empty());
    }

    #[test]
    fn test_descriptor_to_definition() {
        let registry = registry();
        let def = registry.list_descriptors(None)[0].to_definition();
        assert_eq!(def.name, "echo");
        assert_eq!(def.parameters["required"], json!(["text"]));
    }

    #[test]
    fn test_catalog() {
        let catalog = ToolRegistry::standard(ToolContext::new("/tmp")).catalog();
        assert_eq!(catalog["total"], 10);
        assert_eq!(catalog["tools"][0]["name"], "get_weather");
        assert_eq!(catalog["tools"][0]["parameters"]["type"], "object");
    }

    #[tokio::test]
    async fn test_execute_success() {
        let result = registry().execute("echo", args(json!({"text": "hi"}))).await;
        assert_eq!(result, ToolResult::success(json!({"text": "hi"})));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let result = registry().execute("format_disk", Map::new()).await;
        match result {
            ToolResult::Failure { error } => {
                assert!(error.contains("unknown tool"));
                assert!(error.contains("format_disk"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_invalid_arguments() {
        let result = registry().execute("echo", Map::new()).await;
        assert!(!result.is_success());
        assert!(result.summary().contains("missing required parameter 'text'"));
    }

    #[tokio::test]
    async fn test_execute_catches_panic() {
        let result = registry().execute("panic", Map::new()).await;
        assert!(!result.is_success());
        assert!(result.summary().contains("executor exploded"));
    }

    #[tokio::test]
    async fn test_execute_real_tool() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello\n").unwrap();
        let registry = ToolRegistry::standard(ToolContext::new(dir.path()));

        let result = registry.execute("read_file", args(json!({"path": "hello.txt"}))).await;
        match result {
            ToolResult::Success { payload } => assert_eq!(payload["content"], "hello\n"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ToolRegistry>();
    }
}
