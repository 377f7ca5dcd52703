//! Tool system for model interactions
//!
//! Tools give the model bounded access to the host: telemetry, file I/O,
//! allow-listed commands, arithmetic, time and weather lookups. Every tool
//! runs through the `ToolRegistry`, which validates arguments and turns any
//! failure into a `ToolResult::Failure`.

mod calculate;
mod context;
mod current_time;
mod error;
mod execute_command;
pub mod expr;
mod list_files;
pub mod path_policy;
mod process_list;
mod read_file;
mod registry;
pub mod schema;
mod search_web;
mod system_info;
mod weather;
mod write_file;

pub use context::{ToolContext, ToolLimits};
pub use error::ToolError;
pub use registry::{ToolDescriptor, ToolRegistry, ToolRegistryBuilder};
pub use schema::{Arguments, ParamKind, Parameter, ParameterSchema};

pub use calculate::CalculateTool;
pub use current_time::CurrentTimeTool;
pub use execute_command::{ALLOWED_COMMANDS, ExecuteCommandTool};
pub use list_files::ListFilesTool;
pub use process_list::ProcessListTool;
pub use read_file::ReadFileTool;
pub use search_web::SearchWebTool;
pub use system_info::SystemInfoTool;
pub use weather::WeatherTool;
pub use write_file::WriteFileTool;

use async_trait::async_trait;
use serde::Serialize;
use serde::ser::SerializeStruct;
use serde_json::Value;

/// A tool that can be called by the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the name the model calls)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Declared parameters
    fn parameters(&self) -> ParameterSchema;

    /// Execute with arguments already validated against `parameters()`
    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Outcome of one tool execution
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success { payload: Value },
    Failure { error: String },
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        Self::Success { payload }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// One-line rendering for the model: the payload as compact JSON, or `error: <message>`
    pub fn summary(&self) -> String {
        match self {
            Self::Success { payload } => payload.to_string(),
            Self::Failure { error } => format!("error: {}", error),
        }
    }
}

/// Cut `text` to at most `max_chars` characters, noting how much was dropped
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...[truncated, {} chars total]", &text[..cut], text.chars().count()),
        None => text.to_string(),
    }
}

impl Serialize for ToolResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ToolResult", 2)?;
        match self {
            Self::Success { payload } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("payload", payload)?;
            }
            Self::Failure { error } => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}
