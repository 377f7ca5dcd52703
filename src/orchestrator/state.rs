//! Per-run state: the conversation log, the audit trail and the round budget

use serde::Serialize;
use serde_json::{Map, Value};

use crate::llm::Message;
use crate::tools::ToolResult;

/// Append-only message log owned by one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(initial: Vec<Message>) -> Self {
        Self { messages: initial }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// One executed tool call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// 1-based round in which the call ran
    pub round: u32,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    pub result: ToolResult,
}

/// Maximum number of model invocations for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundBudget {
    limit: u32,
    used: u32,
}

impl RoundBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Claim the next round; returns its 1-based number, or None when none are left
    pub fn start_round(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
