//! YAML configuration with a fallback chain
//!
//! Secrets never live here: the file only names the environment variables
//! that hold them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ToolchatError};
use crate::llm::WorkersAiConfig;
use crate::llm::workers_ai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::orchestrator::OrchestratorConfig;
use crate::tools::ToolLimits;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub model: ModelConfig,
    pub chat: ChatConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            model: ModelConfig::default(),
            chat: ChatConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub account_id_env: String,
    pub api_token_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: 30000,
            probe_timeout_ms: 10000,
            account_id_env: "CLOUDFLARE_ACCOUNT_ID".to_string(),
            api_token_env: "CLOUDFLARE_API_TOKEN".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn client_config(&self) -> WorkersAiConfig {
        WorkersAiConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_tool_rounds: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            max_tool_rounds: defaults.max_tool_rounds,
        }
    }
}

impl ChatConfig {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            max_tool_rounds: self.max_tool_rounds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Relative tool paths resolve here; the process cwd when unset
    pub working_dir: Option<PathBuf>,
    pub max_read_bytes: u64,
    pub default_read_lines: usize,
    pub command_timeout_secs: u64,
    pub max_command_timeout_secs: u64,
    pub process_limit: usize,
    pub weather_url: String,
    pub weather_api_key_env: String,
    pub weather_timeout_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let limits = ToolLimits::default();
        Self {
            working_dir: None,
            max_read_bytes: limits.max_read_bytes,
            default_read_lines: limits.default_read_lines,
            command_timeout_secs: limits.command_timeout.as_secs(),
            max_command_timeout_secs: limits.max_command_timeout.as_secs(),
            process_limit: limits.process_limit,
            weather_url: limits.weather_url,
            weather_api_key_env: limits.weather_api_key,
            weather_timeout_ms: limits.weather_timeout.as_millis() as u64,
        }
    }
}

impl ToolsConfig {
    pub fn limits(&self) -> ToolLimits {
        ToolLimits {
            max_read_bytes: self.max_read_bytes,
            default_read_lines: self.default_read_lines,
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            max_command_timeout: Duration::from_secs(self.max_command_timeout_secs),
            process_limit: self.process_limit,
            weather_url: self.weather_url.clone(),
            weather_api_key: self.weather_api_key_env.clone(),
            weather_timeout: Duration::from_millis(self.weather_timeout_ms),
        }
    }

    /// Configured working directory, else the current one
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// explicit path, then `~/.config/toolchat/toolchat.yml`, then
    /// `./toolchat.yml`, then defaults. Only an explicit path is fatal.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .map_err(|e| ToolchatError::Config(format!("Failed to load config from {}: {}", path.display(), e)));
        }

        let project_name = env!("CARGO_PKG_NAME");
        let mut candidates = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(project_name).join(format!("{}.yml", project_name)));
        }
        candidates.push(PathBuf::from(format!("{}.yml", project_name)));

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => log::warn!("Failed to load config from {}: {}", candidate.display(), e),
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model.model, "@cf/meta/llama-3.1-8b-instruct");
        assert_eq!(config.model.timeout_ms, 30000);
        assert_eq!(config.chat.max_tool_rounds, 3);
        assert_eq!(config.tools.max_read_bytes, 1_048_576);
        assert_eq!(config.tools.weather_api_key_env, "WEATHER_API_KEY");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "chat:\n  max_tool_rounds: 5\ntools:\n  process_limit: 7\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.chat.max_tool_rounds, 5);
        assert_eq!(config.chat.max_tokens, 512);
        assert_eq!(config.tools.process_limit, 7);
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        std::fs::write(&path, "model:\n  model: \"@cf/microsoft/phi-2\"\n  timeout_ms: 5000\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.model.model, "@cf/microsoft/phi-2");
        assert_eq!(config.model.client_config().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/toolchat.yml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ToolchatError::Config(_)));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "chat: [not, a, map]").unwrap();

        assert!(Config::load_from_file(&path).is_err());
    }

    #[test]
    fn test_conversions() {
        let mut config = Config::default();
        config.tools.command_timeout_secs = 3;
        config.tools.working_dir = Some(PathBuf::from("/srv/work"));
        config.chat.temperature = 0.2;

        let limits = config.tools.limits();
        assert_eq!(limits.command_timeout, Duration::from_secs(3));
        assert_eq!(config.tools.working_dir().unwrap(), PathBuf::from("/srv/work"));
        assert_eq!(config.chat.orchestrator_config().temperature, 0.2);
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
