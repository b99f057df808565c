//! Message dispatch orchestrator
//!
//! A send moves through these states:
//!
//! ```text
//! Validating -> PersistingUserMessage -> DispatchingToModels
//!            -> PersistingAssistantMessages -> Done
//! ```
//!
//! Validation and user-message failures abort the send before any model is
//! called. Once dispatch starts, each model is handled independently: a
//! failing model is logged and left out of the result, and the send only
//! fails when no model produced a reply.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::ModelCatalog;
use crate::chat::context::{truncate_to_budget, ContextInfo};
use crate::chat::metrics::{record_send, DispatchMetrics};
use crate::chat::types::{now_millis, ChatMessage, SendResult};
use crate::config::Config;
use crate::error::{NymvalError, ProviderError, ProviderErrorKind, Result};
use crate::providers::{HistoryMessage, Provider};
use crate::storage::ConversationGateway;

/// Phase of a single send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Checking the request and that the session exists
    Validating,
    /// Writing the user message
    PersistingUserMessage,
    /// Calling the selected models
    DispatchingToModels,
    /// Writing a model's reply
    PersistingAssistantMessages,
    /// Result assembled
    Done,
    /// Send aborted
    Failed,
}

/// Dispatch tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Call models concurrently
    pub parallel: bool,
    /// Upper bound for any model's context, in estimated tokens
    pub context_budget: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            context_budget: 8000,
        }
    }
}

impl DispatchOptions {
    /// Options from the `dispatch` and `generation` config sections
    pub fn from_config(config: &Config) -> Self {
        Self {
            parallel: config.dispatch.parallel,
            context_budget: config.generation.context_budget,
        }
    }
}

/// Runs sends: persist, fan out to models, persist replies
pub struct Orchestrator {
    gateway: Arc<dyn ConversationGateway>,
    provider: Arc<dyn Provider>,
    catalog: ModelCatalog,
    options: DispatchOptions,
}

impl Orchestrator {
    /// Create an orchestrator
    pub fn new(
        gateway: Arc<dyn ConversationGateway>,
        provider: Arc<dyn Provider>,
        catalog: ModelCatalog,
        options: DispatchOptions,
    ) -> Self {
        Self {
            gateway,
            provider,
            catalog,
            options,
        }
    }

    /// Models available for selection
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Gateway used for persistence
    pub fn gateway(&self) -> &Arc<dyn ConversationGateway> {
        &self.gateway
    }

    /// Send `content` to every model in `model_ids`
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for a blank session id, blank content or no models
    /// - `NotFound` / `Authentication` from the session lookup
    /// - `Storage` when the user message cannot be written
    /// - `AllModelsFailed` when no model replied
    pub async fn send_message(
        &self,
        session_id: &str,
        content: &str,
        model_ids: &[String],
    ) -> Result<SendResult> {
        let send_id = Uuid::new_v4().to_string();
        let result = self.run(&send_id, session_id, content, model_ids).await;

        match &result {
            Ok(sent) if sent.assistant_responses.len() < model_ids.len() => {
                record_send("partial");
            }
            Ok(_) => record_send("success"),
            Err(e) => {
                transition(&send_id, SendState::Failed);
                warn!(send.id = %send_id, "Send failed: {:#}", e);
                record_send("failed");
            }
        }

        result
    }

    async fn run(
        &self,
        send_id: &str,
        session_id: &str,
        content: &str,
        model_ids: &[String],
    ) -> Result<SendResult> {
        transition(send_id, SendState::Validating);

        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(NymvalError::InvalidRequest("session id is required".to_string()).into());
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(
                NymvalError::InvalidRequest("message content must not be blank".to_string()).into(),
            );
        }
        if model_ids.is_empty() {
            return Err(
                NymvalError::InvalidRequest("at least one model must be selected".to_string())
                    .into(),
            );
        }

        let session = self.gateway.get_session(session_id).await?;

        transition(send_id, SendState::PersistingUserMessage);
        let user_message = self
            .gateway
            .append_message(session_id, ChatMessage::user(content))
            .await?;

        let mut snapshot: Vec<HistoryMessage> =
            session.messages.iter().map(HistoryMessage::from).collect();
        snapshot.push(HistoryMessage::from(&user_message));

        transition(send_id, SendState::DispatchingToModels);
        info!(
            send.id = %send_id,
            send.session = session_id,
            send.models = model_ids.len(),
            send.parallel = self.options.parallel,
            "Dispatching message"
        );

        let outcomes = if self.options.parallel {
            join_all(
                model_ids
                    .iter()
                    .map(|model_id| self.dispatch_one(send_id, session_id, model_id, &snapshot)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(model_ids.len());
            for model_id in model_ids {
                outcomes.push(
                    self.dispatch_one(send_id, session_id, model_id, &snapshot)
                        .await,
                );
            }
            outcomes
        };

        let assistant_responses = reduce_outcomes(outcomes)?;

        if let Err(e) = self.gateway.touch_session(session_id, now_millis()).await {
            warn!(send.id = %send_id, "Failed to update last message date: {:#}", e);
        }

        transition(send_id, SendState::Done);
        Ok(SendResult {
            user_message,
            assistant_responses,
        })
    }

    async fn dispatch_one(
        &self,
        send_id: &str,
        session_id: &str,
        model_id: &str,
        snapshot: &[HistoryMessage],
    ) -> std::result::Result<ChatMessage, ProviderError> {
        let metrics = DispatchMetrics::new(model_id);

        let Some(model) = self.catalog.get(model_id) else {
            warn!(send.id = %send_id, model = model_id, "Unknown model selected, skipping");
            let err = ProviderError::new(
                model_id,
                ProviderErrorKind::UnknownModel,
                format!("model '{}' is not in the catalog", model_id),
            );
            metrics.record_failure(err.kind.label());
            return Err(err);
        };

        let budget = model.context_budget(self.options.context_budget);
        let context = truncate_to_budget(snapshot, budget);
        let info = ContextInfo::for_history(&context, budget);
        debug!(
            send.id = %send_id,
            model = model_id,
            context.messages = context.len(),
            context.dropped = snapshot.len() - context.len(),
            context.tokens = info.used_tokens,
            context.budget = budget,
            "Prepared context"
        );

        let reply = match self.provider.complete(model, &context).await {
            Ok(reply) => {
                metrics.record_success();
                reply
            }
            Err(e) => {
                metrics.record_failure(e.kind.label());
                warn!(send.id = %send_id, model = model_id, "Model failed: {}", e);
                return Err(e);
            }
        };

        debug!(
            send.id = %send_id,
            model = model_id,
            state = ?SendState::PersistingAssistantMessages,
            "Send state"
        );

        match self.gateway.append_message(session_id, reply.clone()).await {
            Ok(stored) => {
                if let Err(e) = self.gateway.add_session_model(session_id, model_id).await {
                    warn!(send.id = %send_id, model = model_id, "Failed to record session model: {:#}", e);
                }
                Ok(stored)
            }
            Err(e) => {
                error!(
                    send.id = %send_id,
                    model = model_id,
                    "Failed to persist assistant reply: {:#}",
                    e
                );
                Ok(reply)
            }
        }
    }
}

fn transition(send_id: &str, state: SendState) {
    debug!(send.id = %send_id, state = ?state, "Send state");
}

/// Fold per-model outcomes into the successful replies
///
/// # Errors
///
/// Returns `AllModelsFailed` carrying the last failure when nothing succeeded
pub fn reduce_outcomes(
    outcomes: Vec<std::result::Result<ChatMessage, ProviderError>>,
) -> std::result::Result<Vec<ChatMessage>, NymvalError> {
    let attempted = outcomes.len();
    let mut replies = Vec::with_capacity(attempted);
    let mut last_error = None;

    for outcome in outcomes {
        match outcome {
            Ok(reply) => replies.push(reply),
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(last) if replies.is_empty() => Err(NymvalError::AllModelsFailed { attempted, last }),
        _ => Ok(replies),
    }
}
