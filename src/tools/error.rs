//! Errors raised by tool executors
//!
//! These never leave the registry: `ToolRegistry::execute` folds every one of
//! them into a `ToolResult::Failure`.

use std::time::Duration;

use crate::host::TelemetryError;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("unknown tool {name}")]
    UnknownTool { name: String },

    #[error("Access denied: writing to {path} is not allowed")]
    Denied { path: String },

    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("{path} is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("Command '{program}' is not in the allowed list")]
    CommandNotAllowed { program: String },

    #[error("Command timed out after {}s", .after.as_secs_f64())]
    Timeout { after: Duration },

    #[error("Missing credential: {name} is not set")]
    MissingCredential { name: String },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Tool panicked: {0}")]
    Panicked(String),
}

impl ToolError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_names_the_tool() {
        let err = ToolError::UnknownTool {
            name: "format_disk".to_string(),
        };
        assert_eq!(err.to_string(), "unknown tool format_disk");
    }

    #[test]
    fn test_timeout_message() {
        let err = ToolError::Timeout {
            after: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "Command timed out after 10s");
    }

    #[test]
    fn test_io_helper() {
        let err = ToolError::io("read file", std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "IO error during read file: boom");
    }
}
