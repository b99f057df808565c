//! Static model catalog
//!
//! The catalog is an ordered list of [`ModelDescriptor`]s loaded from the
//! `models` section of the configuration. When the section is absent the
//! built-in list is used.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{NymvalError, Result};

/// Output token limit used when a descriptor does not declare one
pub const DEFAULT_MAX_TOKENS: usize = 2048;

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

/// Description of one selectable model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Internal short key used in sessions and on the command line
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Organisation that publishes the model
    pub provider: String,
    /// Model identifier sent to the upstream API
    pub upstream_id: String,
    /// Context ceiling advertised by the provider
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Optional one-line description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModelDescriptor {
    /// `max_tokens` to request from the provider, capped at `ceiling`
    pub fn output_token_limit(&self, ceiling: usize) -> usize {
        self.max_tokens.min(ceiling)
    }

    /// Token budget for the outbound context, capped at `ceiling`
    pub fn context_budget(&self, ceiling: usize) -> usize {
        self.max_tokens.min(ceiling)
    }
}

/// Ordered, immutable list of models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    /// Build a catalog from an explicit list
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    /// Catalog shipped with the application
    ///
    /// # Examples
    ///
    /// ```
    /// use nymval::catalog::ModelCatalog;
    ///
    /// let catalog = ModelCatalog::builtin();
    /// assert_eq!(catalog.len(), 6);
    /// assert_eq!(catalog.first().unwrap().id, "gemini-pro-2.5");
    /// ```
    pub fn builtin() -> Self {
        fn entry(
            id: &str,
            name: &str,
            provider: &str,
            upstream_id: &str,
            max_tokens: usize,
            description: &str,
        ) -> ModelDescriptor {
            ModelDescriptor {
                id: id.to_string(),
                name: name.to_string(),
                provider: provider.to_string(),
                upstream_id: upstream_id.to_string(),
                max_tokens,
                description: Some(description.to_string()),
            }
        }

        Self::new(vec![
            entry(
                "gemini-pro-2.5",
                "Gemini 2.5 Pro",
                "Google",
                "google/gemini-2.5-pro",
                32768,
                "Capable of advanced reasoning and content generation",
            ),
            entry(
                "deepseek-coder",
                "DeepSeek Coder",
                "DeepSeek",
                "deepseek/deepseek-coder",
                16384,
                "Specialized in code generation and technical contexts",
            ),
            entry(
                "llama3-70b",
                "Llama 3 70B",
                "Meta",
                "meta-llama/llama-3-70b-instruct",
                8192,
                "Meta's flagship model with strong general capabilities",
            ),
            entry(
                "qwen-72b",
                "Qwen 72B",
                "Alibaba",
                "qwen/qwen-72b-chat",
                8192,
                "Versatile model with robust reasoning abilities",
            ),
            entry(
                "claude-3-opus",
                "Claude 3 Opus",
                "Anthropic",
                "anthropic/claude-3-opus",
                200000,
                "Top-tier model with exceptional reasoning and instruction following",
            ),
            entry(
                "mixtral-8x7b",
                "Mixtral 8x7B",
                "Mistral AI",
                "mistralai/mixtral-8x7b-instruct",
                32768,
                "Mixture of experts model with efficient performance",
            ),
        ])
    }

    /// Look up a model by its internal id
    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Models in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    /// The first model, used as the default selection
    pub fn first(&self) -> Option<&ModelDescriptor> {
        self.models.first()
    }

    /// Number of models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Check that the catalog is usable
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the catalog is empty, when ids
    /// repeat, or when a descriptor has a blank id, blank upstream id or a
    /// zero token ceiling.
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(NymvalError::Config("model catalog must not be empty".to_string()).into());
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.id.trim().is_empty() {
                return Err(NymvalError::Config("model id must not be blank".to_string()).into());
            }
            if model.upstream_id.trim().is_empty() {
                return Err(NymvalError::Config(format!(
                    "model '{}' has a blank upstream_id",
                    model.id
                ))
                .into());
            }
            if model.max_tokens == 0 {
                return Err(NymvalError::Config(format!(
                    "model '{}' must have max_tokens > 0",
                    model.id
                ))
                .into());
            }
            if !seen.insert(model.id.as_str()) {
                return Err(NymvalError::Config(format!(
                    "duplicate model id '{}' in catalog",
                    model.id
                ))
                .into());
            }
        }
        Ok(())
    }
}
