//! Conversation orchestrator - multi-round model/tool loop
//!
//! A run starts from the caller's messages, alternates model invocations and
//! tool executions, and ends with a final answer or a structured failure. All
//! run state is owned by the run; the registry and client are shared read-only.

mod request;
mod runner;
mod state;

pub use request::{ChatRequest, OrchestratorConfig};
pub use runner::{CompletedRun, Orchestrator, OrchestratorError, RunFailure};
pub use state::{AuditEntry, Conversation, RoundBudget};
