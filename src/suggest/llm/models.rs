use serde::{Deserialize, Serialize};

/// Output ceiling for both assessment and application calls
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Low temperature keeps the JSON shape and the rewrites predictable
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Hosted completion APIs we know how to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic Messages API
    #[default]
    Anthropic,
    /// OpenRouter chat completions (OpenAI-compatible)
    OpenRouter,
}

impl Provider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3-5-sonnet-20240620",
            Provider::OpenRouter => "anthropic/claude-3.5-sonnet",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com/v1/messages",
            Provider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }

    /// Environment variable checked first when resolving the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenRouter => "openrouter",
        }
    }

    /// Highest sampling temperature the API accepts
    pub fn max_temperature(&self) -> f32 {
        match self {
            Provider::Anthropic => 1.0,
            Provider::OpenRouter => 2.0,
        }
    }
}

/// Everything a backend needs to shape a request besides the prompt
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub provider: Provider,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub endpoint: String,
}

impl ModelSettings {
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            endpoint: provider.default_endpoint().to_string(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

/// Token accounting as reported by the provider.
///
/// Anthropic reports `input_tokens`/`output_tokens`, OpenRouter uses the
/// OpenAI names; both deserialize into the same shape.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default, alias = "input_tokens")]
    pub prompt_tokens: u32,
    #[serde(default, alias = "output_tokens")]
    pub completion_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}
