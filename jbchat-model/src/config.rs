//! Client configuration and provider selection.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Default read timeout for hosted models: the longest wait for the next
/// bytes of a response, not for the whole answer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// The hosted model family backing the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
}

impl ModelProvider {
    /// Default chat model for this provider.
    pub fn default_chat_model(self) -> &'static str {
        match self {
            ModelProvider::OpenAI => "gpt-4o-mini",
            ModelProvider::Gemini => "gemini-2.0-flash",
        }
    }

    /// Environment variables consulted for the API key, in order.
    pub fn api_key_vars(self) -> &'static [&'static str] {
        match self {
            ModelProvider::OpenAI => &["OPENAI_API_KEY"],
            ModelProvider::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        }
    }

    /// Read the first non-empty API key from the environment.
    pub fn api_key_from_env(self) -> Result<String, ModelError> {
        self.api_key_vars()
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|key| !key.is_empty()))
            .ok_or_else(|| {
                ModelError::Config(format!("{} must be set", self.api_key_vars().join(" or ")))
            })
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelProvider::OpenAI => f.write_str("openai"),
            ModelProvider::Gemini => f.write_str("gemini"),
        }
    }
}

impl FromStr for ModelProvider {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAI),
            "gemini" => Ok(ModelProvider::Gemini),
            other => Err(ModelError::Config(format!(
                "unknown model provider '{other}' (expected 'openai' or 'gemini')"
            ))),
        }
    }
}

/// Connection and sampling settings for a hosted chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's public endpoint (proxies, compatible servers).
    pub base_url: Option<String>,
    pub temperature: f32,
    /// Sampling seed, sent where the API supports it.
    pub seed: Option<u64>,
    /// Read timeout; see [`http::build_client`](crate::http::build_client).
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            temperature: 0.0,
            seed: Some(45),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ModelProvider>().unwrap(), ModelProvider::OpenAI);
        assert_eq!(" gemini ".parse::<ModelProvider>().unwrap(), ModelProvider::Gemini);
        assert!("claude".parse::<ModelProvider>().is_err());
    }

    #[test]
    fn provider_display_round_trips() {
        for provider in [ModelProvider::OpenAI, ModelProvider::Gemini] {
            assert_eq!(provider.to_string().parse::<ModelProvider>().unwrap(), provider);
        }
    }

    #[test]
    fn config_defaults_are_deterministic_sampling() {
        let config = ModelConfig::new("key", "gpt-4o-mini");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.seed, Some(45));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
