//! Model client trait, error taxonomy and a scripted mock

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{ModelReply, ModelRequest};

/// Stateless model client - each call carries the whole conversation
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the conversation and tool schema, wait for the assistant reply
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, ModelError>;

    /// Lightweight connectivity check, returns the model's short answer
    async fn probe(&self) -> Result<String, ModelError>;

    /// Model identifier used for requests
    fn model(&self) -> &str;
}

/// Errors that can occur while talking to the inference endpoint
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Endpoint reported failure: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing credential: environment variable {name} not set")]
    MissingCredential { name: String },
}

impl ModelError {
    /// Short machine-readable classification
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Timeout { .. } => "timeout",
            ModelError::ConnectionRefused(_) | ModelError::Connection(_) => "connection",
            ModelError::Status { .. } => "status",
            ModelError::Api(_) => "api",
            ModelError::InvalidResponse(_) => "invalid_response",
            ModelError::MissingCredential { .. } => "missing_credential",
        }
    }

    /// Whether a caller could reasonably retry the whole run later
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Timeout { .. } => true,
            ModelError::ConnectionRefused(_) | ModelError::Connection(_) => true,
            ModelError::Status { status, .. } => *status == 429 || *status >= 500,
            ModelError::Api(_) => false,
            ModelError::InvalidResponse(_) => false,
            ModelError::MissingCredential { .. } => false,
        }
    }
}

enum Script {
    Sequence(VecDeque<Result<ModelReply, ModelError>>),
    Repeat(Result<ModelReply, ModelError>),
}

/// Mock client replaying scripted replies, for tests and dry runs
pub struct MockModelClient {
    script: Mutex<Script>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockModelClient {
    /// Replies are returned in order; once exhausted every call fails
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self::scripted(replies.into_iter().map(Ok).collect())
    }

    /// Like `new`, but individual steps may be errors
    pub fn scripted(steps: Vec<Result<ModelReply, ModelError>>) -> Self {
        Self {
            script: Mutex::new(Script::Sequence(steps.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns the same reply
    pub fn repeating(reply: ModelReply) -> Self {
        Self {
            script: Mutex::new(Script::Repeat(Ok(reply))),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with the same error
    pub fn failing(error: ModelError) -> Self {
        Self {
            script: Mutex::new(Script::Repeat(Err(error))),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of `invoke` calls seen so far
    pub fn invocation_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Snapshot of every request received
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *script {
            Script::Sequence(steps) => steps
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::InvalidResponse("mock script exhausted".to_string()))),
            Script::Repeat(step) => step.clone(),
        }
    }

    async fn probe(&self) -> Result<String, ModelError> {
        Ok("OK".to_string())
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
