//! OpenRouter provider implementation for Nymval
//!
//! This module implements the Provider trait against an OpenAI-compatible
//! chat completions endpoint (OpenRouter by default). Replies are decoded
//! from whichever of the accepted response shapes the upstream returns.

use crate::catalog::ModelDescriptor;
use crate::chat::{now_millis, ChatMessage, Role};
use crate::config::{GenerationConfig, ProviderConfig};
use crate::error::{NymvalError, ProviderError, ProviderErrorKind, Result};
use crate::providers::{validate_history, HistoryMessage, Provider};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// OpenRouter chat completions provider
///
/// # Examples
///
/// ```no_run
/// use nymval::catalog::ModelCatalog;
/// use nymval::config::{GenerationConfig, ProviderConfig};
/// use nymval::providers::{HistoryMessage, OpenRouterProvider, Provider};
///
/// # async fn example() -> nymval::error::Result<()> {
/// let provider = OpenRouterProvider::new(
///     ProviderConfig::default(),
///     GenerationConfig::default(),
///     "sk-or-...".to_string(),
/// )?;
/// let catalog = ModelCatalog::builtin();
/// let model = catalog.get("llama3-70b").unwrap();
/// let reply = provider
///     .complete(model, &[HistoryMessage::text("user", "Hello!")])
///     .await?;
/// println!("{}", reply.content);
/// # Ok(())
/// # }
/// ```
pub struct OpenRouterProvider {
    client: Client,
    config: ProviderConfig,
    generation: GenerationConfig,
    api_key: String,
}

/// Request body for the chat completions endpoint
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [HistoryMessage],
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

/// `{"choices": [{"message": {"content": ...}}]}`
#[derive(Debug, Deserialize)]
struct ChoicesBody {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// `{"content": ...}`
#[derive(Debug, Deserialize)]
struct ContentBody {
    content: String,
}

/// `{"response": ...}`
#[derive(Debug, Deserialize)]
struct ResponseBody {
    response: String,
}

/// `{"error": {...}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<Value>,
}

/// Accepted reply shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// `choices[0].message.content`
    Choices,
    /// top-level `content`
    Content,
    /// top-level `response`
    Response,
}

impl ReplyShape {
    /// Order in which shapes are tried
    pub const PRIORITY: [ReplyShape; 3] =
        [ReplyShape::Choices, ReplyShape::Content, ReplyShape::Response];

    /// Non-blank reply text if `body` has this shape
    pub fn extract(self, body: &Value) -> Option<String> {
        let text = match self {
            ReplyShape::Choices => ChoicesBody::deserialize(body)
                .ok()?
                .choices
                .into_iter()
                .next()?
                .message
                .content?,
            ReplyShape::Content => ContentBody::deserialize(body).ok()?.content,
            ReplyShape::Response => ResponseBody::deserialize(body).ok()?.response,
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Decode a provider body into an assistant message for `model_id`
///
/// # Errors
///
/// Returns `UnrecognizedShape` when no accepted shape yields text
pub fn decode_reply(model_id: &str, body: &Value) -> std::result::Result<ChatMessage, ProviderError> {
    let (shape, content) = ReplyShape::PRIORITY
        .iter()
        .find_map(|shape| shape.extract(body).map(|text| (*shape, text)))
        .ok_or_else(|| {
            ProviderError::new(
                model_id,
                ProviderErrorKind::UnrecognizedShape,
                "Invalid response format from API",
            )
        })?;

    tracing::debug!(model = model_id, ?shape, "Decoded provider reply");

    let id = body
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let created_at = body
        .get("created")
        .and_then(Value::as_i64)
        .and_then(|secs| secs.checked_mul(1000))
        .unwrap_or_else(now_millis);

    Ok(ChatMessage {
        id,
        role: Role::Assistant,
        content,
        model: Some(model_id.to_string()),
        created_at,
    })
}

/// Best message for a non-2xx body: error.message, error.type, error.code,
/// then the status reason phrase
pub fn extract_error_message(body: &str, status: reqwest::StatusCode) -> String {
    let from_body = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| {
            let detail = envelope.error;
            detail
                .message
                .filter(|m| !m.trim().is_empty())
                .or(detail.kind.filter(|t| !t.trim().is_empty()))
                .or(detail.code.map(|c| match c {
                    Value::String(s) => s,
                    other => other.to_string(),
                }))
        });

    from_body
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "Unknown API error".to_string())
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: ProviderConfig, generation: GenerationConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("nymval/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NymvalError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized OpenRouter provider: endpoint={}", config.base_url);

        Ok(Self {
            client,
            config,
            generation,
            api_key,
        })
    }

    /// Configured endpoint
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn transport_error(model_id: &str, e: reqwest::Error) -> ProviderError {
        tracing::error!(model = model_id, "OpenRouter request failed: {}", e);
        ProviderError::new(
            model_id,
            ProviderErrorKind::Transport,
            format!("Request failed: {}", e),
        )
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn complete(
        &self,
        model: &ModelDescriptor,
        history: &[HistoryMessage],
    ) -> std::result::Result<ChatMessage, ProviderError> {
        let messages = validate_history(&model.id, history)?;

        let request = CompletionRequest {
            model: &model.upstream_id,
            messages: &messages,
            max_tokens: model.output_token_limit(self.generation.max_output_ceiling),
            temperature: self.generation.temperature,
            top_p: self.generation.top_p,
            stream: false,
        };

        tracing::debug!(
            model = %model.id,
            upstream = %model.upstream_id,
            "Sending OpenRouter request: {} messages, max_tokens={}",
            request.messages.len(),
            request.max_tokens
        );

        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.app_title)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::transport_error(&model.id, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                model = %model.id,
                "OpenRouter returned error {}: {}",
                status,
                error_text
            );
            return Err(ProviderError::new(
                &model.id,
                ProviderErrorKind::HttpStatus(status.as_u16()),
                extract_error_message(&error_text, status),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Self::transport_error(&model.id, e))?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(model = %model.id, "Failed to parse OpenRouter response: {}", e);
            ProviderError::new(
                &model.id,
                ProviderErrorKind::MalformedBody,
                format!("Failed to parse response: {}", e),
            )
        })?;

        decode_reply(&model.id, &body)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
