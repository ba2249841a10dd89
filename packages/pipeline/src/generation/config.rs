use url::Url;

use crate::error::{PipelineError, Result};

const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// Connection settings for the generation service.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

impl GenerationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| PipelineError::Config("LLM_API_KEY not set".into()))?;

        let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "anthropic".into());

        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let api_base_url = std::env::var("LLM_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());
        validate_base_url(&api_base_url)?;

        let timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);

        Ok(Self {
            provider,
            model,
            api_key,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    /// Create a config builder for testing.
    pub fn builder(api_key: impl Into<String>) -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            api_key: api_key.into(),
            provider: "anthropic".into(),
            model: DEFAULT_MODEL.into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            timeout_secs: 120,
        }
    }
}

fn validate_base_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| PipelineError::Config(format!("invalid LLM_API_BASE_URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PipelineError::Config(format!(
            "unsupported LLM_API_BASE_URL scheme '{other}'"
        ))),
    }
}

/// Builder for constructing `GenerationConfig` in tests.
pub struct GenerationConfigBuilder {
    api_key: String,
    provider: String,
    model: String,
    api_base_url: String,
    timeout_secs: u64,
}

impl GenerationConfigBuilder {
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn build(self) -> GenerationConfig {
        GenerationConfig {
            provider: self.provider,
            model: self.model,
            api_key: self.api_key,
            api_base_url: self.api_base_url,
            timeout_secs: self.timeout_secs,
        }
    }
}
