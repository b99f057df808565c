//! Configuration management for Nymval
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::catalog::ModelCatalog;
use crate::error::{NymvalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Keyring service holding the provider API key
pub const KEYRING_SERVICE: &str = "nymval";

/// Keyring user holding the provider API key
pub const KEYRING_USER: &str = "provider_api_key";

/// Main configuration structure for Nymval
///
/// This structure holds all configuration needed by the chat client:
/// provider connection, generation parameters, dispatch behaviour,
/// storage location, logging and the model catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream provider connection settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Fixed generation parameters
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Fan-out behaviour for multi-model sends
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Conversation storage settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging output settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Selectable models
    #[serde(default)]
    pub models: ModelCatalog,
}

/// Provider configuration
///
/// Specifies which upstream API to call and how to authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Chat completions endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; falls back to the OS keyring when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Value of the `HTTP-Referer` header
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Value of the `X-Title` header
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// HTTP request timeout
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_provider_type() -> String {
    "openrouter".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_referer() -> String {
    "http://localhost".to_string()
}

fn default_app_title() -> String {
    "Nymval-AI Chat".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            base_url: default_base_url(),
            api_key: None,
            referer: default_referer(),
            app_title: default_app_title(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key from config, then the OS keyring
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when neither source has a key
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }

        match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).and_then(|e| e.get_password()) {
            Ok(key) if !key.trim().is_empty() => {
                tracing::debug!("Using provider API key from keyring");
                Ok(key)
            }
            Ok(_) => Err(NymvalError::MissingCredentials(self.provider_type.clone()).into()),
            Err(e) => {
                tracing::debug!("No provider API key in keyring: {}", e);
                Err(NymvalError::MissingCredentials(self.provider_type.clone()).into())
            }
        }
    }
}

/// Generation parameters sent with every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling mass
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Hard ceiling for the requested `max_tokens`
    #[serde(default = "default_max_output_ceiling")]
    pub max_output_ceiling: usize,

    /// Ceiling for the outbound context, in estimated tokens
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}

fn default_max_output_ceiling() -> usize {
    32000
}

fn default_context_budget() -> usize {
    8000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_ceiling: default_max_output_ceiling(),
            context_budget: default_context_budget(),
        }
    }
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Call selected models concurrently instead of one after another
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file; the platform data directory is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "nymval=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NymvalError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| NymvalError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("NYMVAL_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(base_url) = std::env::var("NYMVAL_BASE_URL") {
            self.provider.base_url = base_url;
        }

        if let Ok(api_key) = std::env::var("NYMVAL_API_KEY") {
            self.provider.api_key = Some(api_key);
        }

        if let Ok(referer) = std::env::var("NYMVAL_REFERER") {
            self.provider.referer = referer;
        }

        if let Ok(title) = std::env::var("NYMVAL_APP_TITLE") {
            self.provider.app_title = title;
        }

        if let Ok(timeout) = std::env::var("NYMVAL_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.provider.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid NYMVAL_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(budget) = std::env::var("NYMVAL_CONTEXT_BUDGET") {
            if let Ok(value) = budget.parse() {
                self.generation.context_budget = value;
            } else {
                tracing::warn!("Invalid NYMVAL_CONTEXT_BUDGET: {}", budget);
            }
        }

        if let Ok(parallel) = std::env::var("NYMVAL_PARALLEL_DISPATCH") {
            if let Ok(value) = parallel.parse() {
                self.dispatch.parallel = value;
            } else {
                tracing::warn!("Invalid NYMVAL_PARALLEL_DISPATCH: {}", parallel);
            }
        }

        if let Ok(path) = std::env::var("NYMVAL_HISTORY_DB") {
            self.storage.path = Some(PathBuf::from(path));
        }

        if let Ok(json) = std::env::var("NYMVAL_JSON_LOGS") {
            if let Ok(value) = json.parse() {
                self.logging.json = value;
            } else {
                tracing::warn!("Invalid NYMVAL_JSON_LOGS: {}", json);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }

        if cli.verbose {
            self.logging.level = "nymval=debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let valid_providers = ["openrouter"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(NymvalError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        let base_url = url::Url::parse(&self.provider.base_url).map_err(|e| {
            NymvalError::Config(format!(
                "provider.base_url '{}' is not a valid URL: {}",
                self.provider.base_url, e
            ))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(NymvalError::Config(format!(
                "provider.base_url must use http or https, got '{}'",
                base_url.scheme()
            ))
            .into());
        }

        if self.provider.timeout_seconds == 0 {
            return Err(NymvalError::Config(
                "provider.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(NymvalError::Config(
                "generation.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.generation.top_p <= 0.0 || self.generation.top_p > 1.0 {
            return Err(NymvalError::Config(
                "generation.top_p must be between 0.0 and 1.0".to_string(),
            )
            .into());
        }

        if self.generation.max_output_ceiling == 0 {
            return Err(NymvalError::Config(
                "generation.max_output_ceiling must be greater than 0".to_string(),
            )
            .into());
        }

        if self.generation.context_budget == 0 {
            return Err(NymvalError::Config(
                "generation.context_budget must be greater than 0".to_string(),
            )
            .into());
        }

        self.models.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.provider_type, "openrouter");
        assert_eq!(config.provider.timeout_seconds, 120);
        assert_eq!(config.provider.app_title, "Nymval-AI Chat");
        assert_eq!(config.generation.max_output_ceiling, 32000);
        assert_eq!(config.generation.context_budget, 8000);
        assert!(config.dispatch.parallel);
        assert_eq!(config.models.len(), 6);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_provider() {
        let mut config = Config::default();
        config.provider.provider_type = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_url() {
        let mut config = Config::default();
        config.provider.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.provider.base_url = "ftp://example.com/chat".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_values() {
        let mut config = Config::default();
        config.provider.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.context_budget = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.top_p = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
provider:
  base_url: "http://127.0.0.1:9999/v1/chat/completions"
dispatch:
  parallel: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.provider_type, "openrouter");
        assert_eq!(config.provider.timeout_seconds, 120);
        assert!(!config.dispatch.parallel);
        assert_eq!(config.generation.temperature, 0.7);
        assert_eq!(config.models.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_custom_catalog() {
        let yaml = r#"
models:
  - id: tiny
    name: Tiny
    provider: Local
    upstream_id: local/tiny
    max_tokens: 512
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models.get("tiny").unwrap().max_tokens, 512);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut provider = ProviderConfig::default();
        provider.api_key = Some("sk-test".to_string());
        assert_eq!(provider.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_keyring_miss_is_missing_credentials() {
        let mut provider = ProviderConfig::default();
        provider.api_key = Some("   ".to_string());

        // Hosts without a keyring backend fail the lookup; that still reads
        // as a missing key rather than a separate keyring error
        if let Err(err) = provider.resolve_api_key() {
            let error = err.downcast_ref::<NymvalError>().expect("a NymvalError");
            assert!(matches!(error, NymvalError::MissingCredentials(p) if p == "openrouter"));
            assert_eq!(
                error.user_message(),
                "No API key is configured for the model provider."
            );
        }
    }

    #[test]
    #[serial]
    fn test_apply_env_vars() {
        std::env::set_var("NYMVAL_BASE_URL", "http://localhost:1234/chat");
        std::env::set_var("NYMVAL_CONTEXT_BUDGET", "4000");
        std::env::set_var("NYMVAL_PARALLEL_DISPATCH", "false");
        std::env::set_var("NYMVAL_TIMEOUT_SECONDS", "not-a-number");

        let mut cfg = Config::default();
        cfg.apply_env_vars();

        assert_eq!(cfg.provider.base_url, "http://localhost:1234/chat");
        assert_eq!(cfg.generation.context_budget, 4000);
        assert!(!cfg.dispatch.parallel);
        assert_eq!(cfg.provider.timeout_seconds, 120);

        std::env::remove_var("NYMVAL_BASE_URL");
        std::env::remove_var("NYMVAL_CONTEXT_BUDGET");
        std::env::remove_var("NYMVAL_PARALLEL_DISPATCH");
        std::env::remove_var("NYMVAL_TIMEOUT_SECONDS");
    }
}
