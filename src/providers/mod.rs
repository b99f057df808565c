//! Provider module for Nymval
//!
//! This module contains the model provider abstraction, the OpenRouter
//! implementation, and a scripted provider for tests.

pub mod base;
pub mod fake;
pub mod openrouter;

pub use base::{
    validate_history, ContentItem, HistoryMessage, ImageUrl, MessageContent, Provider, VALID_ROLES,
};
pub use fake::{RecordedCall, ScriptedProvider};
pub use openrouter::{decode_reply, OpenRouterProvider, ReplyShape};

use crate::config::{GenerationConfig, ProviderConfig};
use crate::error::{NymvalError, Result};

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration
/// * `generation` - Generation parameters sent with each request
///
/// # Errors
///
/// Returns error if the provider type is unknown, no API key can be
/// resolved, or initialization fails
pub fn create_provider(
    config: &ProviderConfig,
    generation: &GenerationConfig,
) -> Result<Box<dyn Provider>> {
    match config.provider_type.as_str() {
        "openrouter" => {
            let api_key = config.resolve_api_key()?;
            Ok(Box::new(OpenRouterProvider::new(
                config.clone(),
                generation.clone(),
                api_key,
            )?))
        }
        other => Err(NymvalError::Config(format!("Unknown provider type: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_unknown_type() {
        let config = ProviderConfig {
            provider_type: "bogus".to_string(),
            ..Default::default()
        };
        let result = create_provider(&config, &GenerationConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_create_provider_with_key() {
        let config = ProviderConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let provider = create_provider(&config, &GenerationConfig::default()).unwrap();
        assert_eq!(provider.name(), "openrouter");
    }
}
