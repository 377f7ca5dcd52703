//! Credential lookup by name

use std::collections::HashMap;

/// Resolves a named secret (API key, account id)
pub trait CredentialSource: Send + Sync {
    /// Returns None when the credential is unset or empty
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads credentials from process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Fixed in-memory credentials
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.trim().is_empty()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credentials() {
        let creds = StaticCredentials::new().with("WEATHER_API_KEY", "abc").with("EMPTY", "  ");
        assert_eq!(creds.lookup("WEATHER_API_KEY").as_deref(), Some("abc"));
        assert_eq!(creds.lookup("EMPTY"), None);
        assert_eq!(creds.lookup("MISSING"), None);
    }

    #[test]
    fn test_env_credentials_missing() {
        let creds = EnvCredentials;
        assert_eq!(creds.lookup("TOOLCHAT_TEST_SURELY_UNSET_VARIABLE"), None);
    }
}
