//! Base provider trait and wire-level message types
//!
//! This module defines the Provider trait that model backends implement,
//! together with the context message shape sent upstream and the validation
//! applied to it before any request is made.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::ModelDescriptor;
use crate::chat::ChatMessage;
use crate::error::{ProviderError, ProviderErrorKind};

/// Roles accepted by upstream chat APIs
pub const VALID_ROLES: [&str; 3] = ["user", "assistant", "system"];

/// One entry of the context sent to a provider
///
/// The role is kept as a raw string so that the normalizer, not the type
/// system, decides what is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Role of the sender (user, assistant, system)
    pub role: String,
    /// Plain text or multi-part content
    pub content: MessageContent,
}

impl HistoryMessage {
    /// Creates a plain text history entry
    ///
    /// # Examples
    ///
    /// ```
    /// use nymval::providers::{HistoryMessage, MessageContent};
    ///
    /// let msg = HistoryMessage::text("user", "Hello!");
    /// assert_eq!(msg.role, "user");
    /// assert_eq!(msg.content, MessageContent::Text("Hello!".to_string()));
    /// ```
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// Creates a multi-part history entry
    pub fn parts(role: impl Into<String>, items: Vec<ContentItem>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Parts(items),
        }
    }
}

impl From<&ChatMessage> for HistoryMessage {
    fn from(message: &ChatMessage) -> Self {
        HistoryMessage::text(message.role.as_str(), message.content.clone())
    }
}

/// Message body: a string or a list of typed parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Multi-part content (text and image references)
    Parts(Vec<ContentItem>),
}

impl MessageContent {
    /// Text used for token estimation; parts contribute their text items
    pub fn cost_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(items) => items
                .iter()
                .filter_map(|item| item.text.as_deref())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// One part of multi-part content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Part type: `text` or `image_url`
    #[serde(rename = "type")]
    pub kind: String,
    /// Text for `text` parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image reference for `image_url` parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
}

impl ContentItem {
    /// A text part
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
            image_url: None,
        }
    }

    /// An image part
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: "image_url".to_string(),
            text: None,
            image_url: Some(ImageUrl { url: url.into() }),
        }
    }
}

/// Image reference inside an `image_url` part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Location of the image
    pub url: String,
}

/// Validate a context and return the copy that goes on the wire
///
/// Text content is trimmed. Multi-part items must be `text` with text or
/// `image_url` with a url.
///
/// # Errors
///
/// Returns a [`ProviderError`] tagged with `model_id` whose kind is
/// `EmptyHistory`, `InvalidRole` or `InvalidContent`.
pub fn validate_history(
    model_id: &str,
    history: &[HistoryMessage],
) -> Result<Vec<HistoryMessage>, ProviderError> {
    if history.is_empty() {
        return Err(ProviderError::new(
            model_id,
            ProviderErrorKind::EmptyHistory,
            "Messages array is required and cannot be empty",
        ));
    }

    history
        .iter()
        .enumerate()
        .map(|(index, message)| {
            if !VALID_ROLES.contains(&message.role.as_str()) {
                return Err(ProviderError::new(
                    model_id,
                    ProviderErrorKind::InvalidRole,
                    format!("Invalid message role '{}' at index {}", message.role, index),
                ));
            }

            let content = match &message.content {
                MessageContent::Text(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        return Err(invalid_content(model_id, index, "empty text"));
                    }
                    MessageContent::Text(trimmed.to_string())
                }
                MessageContent::Parts(items) => {
                    if items.is_empty() {
                        return Err(invalid_content(model_id, index, "no content parts"));
                    }
                    for item in items {
                        validate_item(model_id, index, item)?;
                    }
                    MessageContent::Parts(items.clone())
                }
            };

            Ok(HistoryMessage {
                role: message.role.clone(),
                content,
            })
        })
        .collect()
}

fn validate_item(model_id: &str, index: usize, item: &ContentItem) -> Result<(), ProviderError> {
    match item.kind.as_str() {
        "text" => match item.text.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(()),
            _ => Err(invalid_content(model_id, index, "text part without text")),
        },
        "image_url" => match &item.image_url {
            Some(image) if !image.url.trim().is_empty() => Ok(()),
            _ => Err(invalid_content(model_id, index, "image_url part without url")),
        },
        other => Err(invalid_content(
            model_id,
            index,
            &format!("unsupported content type '{}'", other),
        )),
    }
}

fn invalid_content(model_id: &str, index: usize, detail: &str) -> ProviderError {
    ProviderError::new(
        model_id,
        ProviderErrorKind::InvalidContent,
        format!("Invalid message content at index {}: {}", index, detail),
    )
}

/// Provider trait that all model backends must implement
///
/// A provider turns a (pre-truncated) context into exactly one assistant
/// message attributed to `model.id`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation for one model
    ///
    /// # Arguments
    ///
    /// * `model` - Catalog entry of the target model
    /// * `history` - Context, oldest first, already fitted to the model's budget
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] describing why no reply was produced
    async fn complete(
        &self,
        model: &ModelDescriptor,
        history: &[HistoryMessage],
    ) -> Result<ChatMessage, ProviderError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
