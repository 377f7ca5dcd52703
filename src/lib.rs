//! Toolchat - tool-augmented conversations with a hosted language model
//!
//! A run hands the caller's messages and a tool catalog to the model, executes
//! whatever tools it asks for against a bounded, policy-checked registry, feeds
//! the results back, and repeats until the model answers or the round budget
//! runs out.

pub mod config;
pub mod error;
pub mod host;
pub mod llm;
pub mod orchestrator;
pub mod tools;

pub use error::{Result, ToolchatError};
