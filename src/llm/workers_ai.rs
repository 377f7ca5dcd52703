//! Hosted inference endpoint client
//!
//! Implements `ModelClient` against an account-scoped "run model" endpoint:
//! `POST {base_url}/{account_id}/ai/run/{model}` with a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::host::CredentialSource;
use crate::llm::client::{ModelClient, ModelError};
use crate::llm::types::{Message, ModelReply, ModelRequest, ToolCall, Usage};

/// Default endpoint base
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4/accounts";

/// Default model to use
pub const DEFAULT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

const PROBE_PROMPT: &str = "Connection test. Reply briefly with 'OK'.";

/// Configuration for the inference client
#[derive(Debug, Clone)]
pub struct WorkersAiConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for WorkersAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl WorkersAiConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// A model identifier known to work with the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownModel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Static catalog of models offered by the endpoint
pub fn known_models() -> &'static [KnownModel] {
    &[
        KnownModel {
            id: "@cf/meta/llama-3.1-8b-instruct",
            name: "Llama 3.1 8B Instruct",
            description: "General purpose instruction-tuned model with function calling",
        },
        KnownModel {
            id: "@cf/meta/llama-3.2-11b-vision-instruct",
            name: "Llama 3.2 11B Vision",
            description: "Instruction-tuned model with image input",
        },
        KnownModel {
            id: "@cf/mistral/mistral-7b-instruct-v0.1",
            name: "Mistral 7B Instruct",
            description: "Compact, fast instruction model",
        },
        KnownModel {
            id: "@cf/microsoft/phi-2",
            name: "Microsoft Phi-2",
            description: "Small language model",
        },
    ]
}

/// Inference endpoint client
pub struct WorkersAiClient {
    client: Client,
    account_id: String,
    api_token: String,
    config: WorkersAiConfig,
}

impl WorkersAiClient {
    /// Create a client with explicit credentials
    pub fn new(account_id: impl Into<String>, api_token: impl Into<String>, config: WorkersAiConfig) -> Self {
        Self {
            client: Client::new(),
            account_id: account_id.into(),
            api_token: api_token.into(),
            config,
        }
    }

    /// Create a client resolving both credentials by name
    pub fn from_credentials(
        credentials: &dyn CredentialSource,
        account_id_name: &str,
        api_token_name: &str,
        config: WorkersAiConfig,
    ) -> Result<Self, ModelError> {
        let account_id = credentials.lookup(account_id_name).ok_or_else(|| ModelError::MissingCredential {
            name: account_id_name.to_string(),
        })?;
        let api_token = credentials.lookup(api_token_name).ok_or_else(|| ModelError::MissingCredential {
            name: api_token_name.to_string(),
        })?;
        Ok(Self::new(account_id, api_token, config))
    }

    /// Full URL for the configured model
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}/ai/run/{}",
            self.config.base_url.trim_end_matches('/'),
            self.account_id,
            self.config.model
        )
    }

    /// Build the request body
    fn build_body(&self, request: &ModelRequest) -> Value {
        let mut body = json!({
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }

        body
    }

    /// Parse the endpoint envelope into a ModelReply
    fn parse_response(&self, body: Value) -> Result<ModelReply, ModelError> {
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let errors = body.get("errors").map(Value::to_string).unwrap_or_else(|| "unknown error".to_string());
            return Err(ModelError::Api(errors));
        }

        let result = body
            .get("result")
            .ok_or_else(|| ModelError::InvalidResponse("missing 'result' field".to_string()))?;

        let content = match result.get("response") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let mut tool_calls = Vec::new();
        if let Some(calls) = result.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                tool_calls.push(parse_tool_call(call)?);
            }
        }

        let usage = result.get("usage").map(parse_usage).unwrap_or_default();

        Ok(ModelReply {
            content,
            tool_calls,
            usage,
        })
    }

    /// Send a body to the endpoint with the given timeout
    async fn send(&self, body: &Value, timeout: Duration) -> Result<Value, ModelError> {
        let response = self
            .client
            .post(self.endpoint_url())
            .bearer_auth(&self.api_token)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::warn!("Inference endpoint returned {}: {}", status, error_body);
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

/// Map a transport failure onto the distinguishable error variants
fn classify_transport_error(err: reqwest::Error, timeout: Duration) -> ModelError {
    if err.is_timeout() {
        return ModelError::Timeout { after: timeout };
    }
    if err.is_connect() {
        let refused = io_error_kind(&err) == Some(std::io::ErrorKind::ConnectionRefused);
        return if refused {
            ModelError::ConnectionRefused(err.to_string())
        } else {
            ModelError::Connection(err.to_string())
        };
    }
    ModelError::Connection(err.to_string())
}

fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        current = e.source();
    }
    None
}

fn parse_tool_call(call: &Value) -> Result<ToolCall, ModelError> {
    let name = call
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidResponse("tool call without a name".to_string()))?;

    // Some models encode the arguments object as a JSON string
    let arguments = match call.get("arguments") {
        Some(Value::String(raw)) if raw.trim().is_empty() => Value::Null,
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|e| ModelError::InvalidResponse(format!("bad arguments for tool '{}': {}", name, e)))?,
        Some(other) => other.clone(),
        None => Value::Null,
    };

    Ok(ToolCall::new(name, arguments))
}

fn parse_usage(usage: &Value) -> Usage {
    Usage {
        prompt_tokens: usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
        completion_tokens: usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
    }
}

#[async_trait]
impl ModelClient for WorkersAiClient {
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        log::info!(
            "Inference request to {}: {} messages, {} tools",
            self.config.model,
            request.messages.len(),
            request.tools.len()
        );
        let body = self.build_body(request);
        let response = self.send(&body, self.config.timeout).await?;
        self.parse_response(response)
    }

    async fn probe(&self) -> Result<String, ModelError> {
        let request = ModelRequest::new(vec![Message::user(PROBE_PROMPT)]).with_max_tokens(16);
        let body = self.build_body(&request);
        let response = self.send(&body, self.config.probe_timeout).await?;
        Ok(self.parse_response(response)?.content)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for WorkersAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkersAiClient")
            .field("model", &self.config.model)
            .field("account_id", &self.account_id)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}
