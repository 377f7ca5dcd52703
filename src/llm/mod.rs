//! Model client layer - inference endpoint integration
//!
//! This module provides:
//! - Message types for model communication
//! - ModelClient trait for endpoint abstraction
//! - WorkersAiClient implementation
//! - MockModelClient for tests

pub mod client;
pub mod types;
pub mod workers_ai;

pub use client::{MockModelClient, ModelClient, ModelError};
pub use types::{Message, ModelReply, ModelRequest, Role, ToolCall, ToolDefinition, Usage};
pub use workers_ai::{KnownModel, WorkersAiClient, WorkersAiConfig, known_models};
