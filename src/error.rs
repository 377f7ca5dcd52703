//! Error types for Toolchat
//!
//! Centralized error handling using thiserror. Subsystems keep their own
//! error enums (`ModelError`, `ToolError`, `OrchestratorError`); this one is
//! what config loading and the CLI surface. Tool failures never reach it: the
//! registry turns them into results.

use thiserror::Error;

use crate::llm::ModelError;
use crate::orchestrator::OrchestratorError;

/// All error types that can occur in Toolchat
#[derive(Debug, Error)]
pub enum ToolchatError {
    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(String),

    /// Inference endpoint error
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Orchestration run failed
    #[error("Run failed: {0}")]
    Run(#[from] OrchestratorError),

    /// Malformed inbound request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Toolchat operations
pub type Result<T> = std::result::Result<T, ToolchatError>;
