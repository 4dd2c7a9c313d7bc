//! Configuration management for kunth
//!
//! Settings come from a TOML file (default `<config dir>/kunth/config.toml`)
//! with command-line overrides on top. API keys never live in the file: they
//! come from the environment or the system keychain.

use crate::publish::PublishSettings;
use crate::suggest::llm::{ModelSettings, Provider};
use crate::suggest::SelectionPolicy;
use anyhow::Context;
use keyring::Entry;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use url::Url;

const KEYRING_SERVICE: &str = "kunth";
const DEFAULT_PRIORITY_THRESHOLD: u32 = 2;
const DEFAULT_STANDARDS_EXTENSION: &str = "md";
const DEFAULT_GIT_TIMEOUT_SECS: u64 = 120;

/// A configuration that cannot be used as given
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting `{key}` (set it in the config file or pass --{flag})")]
    Missing {
        key: &'static str,
        flag: &'static str,
    },
    #[error("`{0}` must not be empty")]
    Empty(&'static str),
    #[error("invalid branch name '{0}'")]
    InvalidBranch(String),
    #[error("invalid endpoint '{value}': {reason}")]
    InvalidEndpoint { value: String, reason: String },
    #[error("temperature for {provider} must be between 0.0 and {max}, got {value}")]
    InvalidTemperature {
        provider: &'static str,
        max: f32,
        value: f32,
    },
    #[error("max_tokens must be greater than zero")]
    ZeroMaxTokens,
}

/// On-disk layout of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub target_file: Option<PathBuf>,
    pub repository_path: Option<PathBuf>,
    pub priority_threshold: Option<u32>,
    pub standards_directory: Option<PathBuf>,
    /// Only files with this extension are read as standards
    pub standards_extension: Option<String>,
    pub llm: LlmSection,
    pub publish: PublishSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Full URL of the completion endpoint, for proxies and gateways
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishSection {
    pub branch: Option<String>,
    pub commit_message: Option<String>,
    pub remote: Option<String>,
    pub base_ref: Option<String>,
    pub selection: Option<SelectionPolicy>,
    pub accept_unstructured_reply: Option<bool>,
    pub git_timeout_secs: Option<u64>,
}

/// Values given on the command line; they win over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target_file: Option<PathBuf>,
    pub repository_path: Option<PathBuf>,
    pub priority_threshold: Option<u32>,
    pub standards_directory: Option<PathBuf>,
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub selection: Option<SelectionPolicy>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// File to assess; relative paths are taken from `repository_path`
    pub target_file: PathBuf,
    pub repository_path: PathBuf,
    pub priority_threshold: u32,
    pub standards_directory: PathBuf,
    pub standards_extension: String,
    pub model: ModelSettings,
    pub publish: PublishSettings,
    pub git_timeout: Duration,
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kunth"))
    }

    /// Default config file location, whether or not it exists
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Load from `path` (which must exist) or from the default location (which
    /// may not), then apply `overrides`.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let text = match path {
            Some(path) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config '{}'", path.display()))?,
            ),
            None => match Self::default_path() {
                Some(default) if default.exists() => Some(
                    fs::read_to_string(&default).with_context(|| {
                        format!("Failed to read config '{}'", default.display())
                    })?,
                ),
                _ => None,
            },
        };

        match text {
            Some(text) => Self::from_toml(&text, overrides),
            None => Ok(Self::resolve(FileConfig::default(), overrides)?),
        }
    }

    /// Parse a TOML document and apply `overrides`
    pub fn from_toml(text: &str, overrides: Overrides) -> anyhow::Result<Self> {
        let file: FileConfig = toml::from_str(text).context("Config file is not valid")?;
        Ok(Self::resolve(file, overrides)?)
    }

    fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let repository_path = overrides
            .repository_path
            .or(file.repository_path)
            .ok_or(ConfigError::Missing {
                key: "repository_path",
                flag: "repo",
            })?;
        let target_file = overrides
            .target_file
            .or(file.target_file)
            .ok_or(ConfigError::Missing {
                key: "target_file",
                flag: "file",
            })?;
        let target_file = if target_file.is_absolute() {
            target_file
        } else {
            repository_path.join(target_file)
        };
        let standards_directory = overrides
            .standards_directory
            .or(file.standards_directory)
            .ok_or(ConfigError::Missing {
                key: "standards_directory",
                flag: "standards",
            })?;
        let priority_threshold = overrides
            .priority_threshold
            .or(file.priority_threshold)
            .unwrap_or(DEFAULT_PRIORITY_THRESHOLD);
        let standards_extension = file
            .standards_extension
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or_else(|| DEFAULT_STANDARDS_EXTENSION.to_string());
        if standards_extension.is_empty() {
            return Err(ConfigError::Empty("standards_extension"));
        }

        let model = resolve_model(file.llm, overrides.provider, overrides.model)?;

        let defaults = PublishSettings::default();
        let section = file.publish;
        let publish = PublishSettings {
            selection: overrides
                .selection
                .or(section.selection)
                .unwrap_or(defaults.selection),
            branch: section.branch.unwrap_or(defaults.branch),
            commit_message: section.commit_message.unwrap_or(defaults.commit_message),
            remote: section.remote.unwrap_or(defaults.remote),
            base_ref: section.base_ref.unwrap_or(defaults.base_ref),
            accept_unstructured_reply: section
                .accept_unstructured_reply
                .unwrap_or(defaults.accept_unstructured_reply),
        };
        if !crate::git_ops::is_valid_branch_name(&publish.branch) {
            return Err(ConfigError::InvalidBranch(publish.branch));
        }
        if publish.commit_message.trim().is_empty() {
            return Err(ConfigError::Empty("publish.commit_message"));
        }
        if publish.remote.trim().is_empty() {
            return Err(ConfigError::Empty("publish.remote"));
        }
        if publish.base_ref.trim().is_empty() {
            return Err(ConfigError::Empty("publish.base_ref"));
        }

        Ok(Self {
            target_file,
            repository_path,
            priority_threshold,
            standards_directory,
            standards_extension,
            model,
            publish,
            git_timeout: Duration::from_secs(
                section.git_timeout_secs.unwrap_or(DEFAULT_GIT_TIMEOUT_SECS),
            ),
        })
    }
}

fn resolve_model(
    llm: LlmSection,
    provider_override: Option<Provider>,
    model_override: Option<String>,
) -> Result<ModelSettings, ConfigError> {
    let provider = provider_override.or(llm.provider).unwrap_or_default();
    let mut model = ModelSettings::for_provider(provider);

    if let Some(name) = model_override.or(llm.model) {
        if name.trim().is_empty() {
            return Err(ConfigError::Empty("llm.model"));
        }
        model.model = name;
    }
    if let Some(max_tokens) = llm.max_tokens {
        if max_tokens == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        model.max_tokens = max_tokens;
    }
    if let Some(temperature) = llm.temperature {
        if !(0.0..=provider.max_temperature()).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature {
                provider: provider.label(),
                max: provider.max_temperature(),
                value: temperature,
            });
        }
        model.temperature = temperature;
    }
    if let Some(endpoint) = llm.endpoint {
        let url = Url::parse(&endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            value: endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                value: endpoint,
                reason: "scheme must be http or https".to_string(),
            });
        }
        model.endpoint = url.to_string();
    }

    Ok(model)
}

fn keyring_entry(provider: Provider) -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, provider.label())
}

fn read_keyring_key(provider: Provider) -> Result<Option<String>, keyring::Error> {
    let entry = keyring_entry(provider)?;
    match entry.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Get the API key for `provider` (from environment or keychain)
pub fn api_key(provider: Provider) -> Option<String> {
    // Environment variable takes precedence
    if let Ok(key) = std::env::var(provider.api_key_env()) {
        if !key.trim().is_empty() {
            return Some(key);
        }
    }

    match read_keyring_key(provider) {
        Ok(key) => key,
        Err(err) => {
            warn!(
                "failed to read API key from system keychain: {} (set {} as a workaround)",
                err,
                provider.api_key_env()
            );
            None
        }
    }
}

/// Store the API key for `provider` in the keychain and verify it reads back
pub fn store_api_key(provider: Provider, key: &str) -> anyhow::Result<()> {
    keyring_entry(provider)
        .and_then(|entry| entry.set_password(key))
        .with_context(|| {
            format!(
                "Failed to store API key in system keychain. You can set {} instead.",
                provider.api_key_env()
            )
        })?;

    match read_keyring_key(provider) {
        Ok(Some(stored)) if stored == key => Ok(()),
        Ok(_) => Err(anyhow::anyhow!(
            "API key verification failed: key was not persisted to keychain. You can set {} instead.",
            provider.api_key_env()
        )),
        Err(err) => Err(anyhow::anyhow!(
            "API key verification failed: couldn't read back from keychain ({}). You can set {} instead.",
            err,
            provider.api_key_env()
        )),
    }
}

/// Interactive prompt to set up an API key
pub fn setup_api_key_interactive(provider: Provider) -> anyhow::Result<()> {
    use std::io::{self, Write};

    println!();
    println!("  kunth uses {} to assess and rewrite code.", provider.label());
    println!("  Paste an API key below (saved in your system keychain).");
    println!();
    print!("  API Key: ");
    io::stdout().flush()?;

    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim();

    if key.is_empty() {
        anyhow::bail!("No API key provided");
    }

    store_api_key(provider, key)?;

    println!();
    println!("  + API key saved to the system keychain");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
target_file = "app/story.py"
repository_path = "/work/mythos"
standards_directory = "standards/python"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL, Overrides::default()).unwrap();
        assert_eq!(config.target_file, PathBuf::from("/work/mythos/app/story.py"));
        assert_eq!(config.repository_path, PathBuf::from("/work/mythos"));
        assert_eq!(config.priority_threshold, 2);
        assert_eq!(config.standards_extension, "md");
        assert_eq!(config.model, ModelSettings::default());
        assert_eq!(config.publish, PublishSettings::default());
        assert_eq!(config.git_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_full_config() {
        let text = r#"
target_file = "/abs/file.py"
repository_path = "/work/mythos"
priority_threshold = 1
standards_directory = "standards"
standards_extension = ".txt"

[llm]
provider = "openrouter"
model = "anthropic/claude-3.5-sonnet"
max_tokens = 2000
temperature = 0.0
endpoint = "https://gateway.example.com/v1/chat/completions"

[publish]
branch = "fix/standards"
commit_message = "Apply standards"
remote = "upstream"
base_ref = "HEAD"
selection = "all-eligible"
accept_unstructured_reply = true
git_timeout_secs = 30
"#;
        let config = Config::from_toml(text, Overrides::default()).unwrap();
        assert_eq!(config.target_file, PathBuf::from("/abs/file.py"));
        assert_eq!(config.priority_threshold, 1);
        assert_eq!(config.standards_extension, "txt");
        assert_eq!(config.model.provider, Provider::OpenRouter);
        assert_eq!(config.model.max_tokens, 2000);
        assert_eq!(
            config.model.endpoint,
            "https://gateway.example.com/v1/chat/completions"
        );
        assert_eq!(config.publish.branch, "fix/standards");
        assert_eq!(config.publish.remote, "upstream");
        assert_eq!(config.publish.selection, SelectionPolicy::AllEligible);
        assert!(config.publish.accept_unstructured_reply);
        assert_eq!(config.git_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let overrides = Overrides {
            priority_threshold: Some(0),
            target_file: Some(PathBuf::from("other.py")),
            provider: Some(Provider::OpenRouter),
            ..Overrides::default()
        };
        let config = Config::from_toml(MINIMAL, overrides).unwrap();
        assert_eq!(config.priority_threshold, 0);
        assert_eq!(config.target_file, PathBuf::from("/work/mythos/other.py"));
        assert_eq!(config.model.model, Provider::OpenRouter.default_model());
    }

    #[test]
    fn test_missing_required_setting() {
        let err = Config::resolve(FileConfig::default(), Overrides::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                key: "repository_path",
                flag: "repo"
            }
        );
        assert!(err.to_string().contains("--repo"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_branch = format!("{}\n[publish]\nbranch = \"bad..branch\"\n", MINIMAL);
        assert!(Config::from_toml(&bad_branch, Overrides::default()).is_err());

        let bad_temp = format!("{}\n[llm]\ntemperature = 1.5\n", MINIMAL);
        assert!(Config::from_toml(&bad_temp, Overrides::default()).is_err());

        let bad_endpoint = format!("{}\n[llm]\nendpoint = \"ftp://example.com\"\n", MINIMAL);
        assert!(Config::from_toml(&bad_endpoint, Overrides::default()).is_err());
    }

    #[test]
    fn test_temperature_range_follows_provider() {
        let anthropic = format!("{}\n[llm]\ntemperature = 1.5\n", MINIMAL);
        let err = Config::resolve(
            toml::from_str(&anthropic).unwrap(),
            Overrides::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidTemperature {
                provider: "anthropic",
                max: 1.0,
                value: 1.5
            }
        );

        let openrouter = format!(
            "{}\n[llm]\nprovider = \"openrouter\"\ntemperature = 1.5\n",
            MINIMAL
        );
        let config = Config::from_toml(&openrouter, Overrides::default()).unwrap();
        assert!((config.model.temperature - 1.5).abs() < f32::EPSILON);

        let too_hot = format!(
            "{}\n[llm]\nprovider = \"openrouter\"\ntemperature = 2.5\n",
            MINIMAL
        );
        assert!(Config::from_toml(&too_hot, Overrides::default()).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let text = format!("{}\npriority_filter = 2\n", MINIMAL);
        assert!(Config::from_toml(&text, Overrides::default()).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kunth.toml");
        fs::write(&path, MINIMAL).unwrap();
        let config = Config::load(Some(&path), Overrides::default()).unwrap();
        assert_eq!(config.standards_directory, PathBuf::from("standards/python"));

        let missing = dir.path().join("missing.toml");
        assert!(Config::load(Some(&missing), Overrides::default()).is_err());
    }
}
