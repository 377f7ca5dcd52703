//! Inbound chat requests and their validation

use serde::Deserialize;

use super::OrchestratorError;
use crate::llm::Message;

/// Generation defaults applied when a request leaves a field unset
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_tool_rounds: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            max_tool_rounds: 3,
        }
    }
}

/// A chat request from a caller
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Enabled tool names; None enables every registered tool
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tool_rounds: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = Some(rounds);
        self
    }

    /// Fill defaults and reject malformed requests
    pub(crate) fn resolve(&self, defaults: &OrchestratorConfig) -> Result<RunSettings, OrchestratorError> {
        let invalid = |msg: &str| Err(OrchestratorError::InvalidRequest(msg.to_string()));

        if self.messages.is_empty() {
            return invalid("no messages provided");
        }

        let max_tokens = self.max_tokens.unwrap_or(defaults.max_tokens);
        if max_tokens == 0 {
            return invalid("max_tokens must be greater than zero");
        }

        let temperature = self.temperature.unwrap_or(defaults.temperature);
        if !(0.0..=5.0).contains(&temperature) {
            return invalid("temperature must be between 0.0 and 5.0");
        }

        let max_tool_rounds = self.max_tool_rounds.unwrap_or(defaults.max_tool_rounds);
        if max_tool_rounds == 0 {
            return invalid("max_tool_rounds must be at least 1");
        }

        Ok(RunSettings {
            max_tokens,
            temperature,
            max_tool_rounds,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RunSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_tool_rounds: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest::new(vec![Message::user("hi")])
    }

    #[test]
    fn test_defaults_applied() {
        let settings = request().resolve(&OrchestratorConfig::default()).unwrap();
        assert_eq!(settings.max_tokens, 512);
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_tool_rounds, 3);
    }

    #[test]
    fn test_overrides() {
        let settings = request()
            .with_max_tokens(64)
            .with_temperature(0.0)
            .with_max_tool_rounds(5)
            .resolve(&OrchestratorConfig::default())
            .unwrap();
        assert_eq!(settings.max_tokens, 64);
        assert_eq!(settings.temperature, 0.0);
        assert_eq!(settings.max_tool_rounds, 5);
    }

    #[test]
    fn test_rejections() {
        let defaults = OrchestratorConfig::default();
        let cases = [
            ChatRequest::new(vec![]),
            request().with_max_tokens(0),
            request().with_temperature(-0.1),
            request().with_temperature(f32::NAN),
            request().with_temperature(5.5),
            request().with_max_tool_rounds(0),
        ];

        for case in cases {
            let err = case.resolve(&defaults).unwrap_err();
            assert!(matches!(err, OrchestratorError::InvalidRequest(_)), "{:?}", case);
            assert_eq!(err.kind(), "validation");
        }
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "messages": [{"role": "user", "content": "2+2"}],
            "tools": ["calculate"],
            "max_tool_rounds": 2
        }"#;

        let request: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.tools, Some(vec!["calculate".to_string()]));
        assert_eq!(request.max_tool_rounds, Some(2));
        assert_eq!(request.max_tokens, None);
    }
}
