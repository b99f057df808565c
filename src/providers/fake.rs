//! Scripted in-process provider
//!
//! `ScriptedProvider` answers each model with a canned reply or failure and
//! records every call, so dispatch logic can be exercised without a network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::catalog::ModelDescriptor;
use crate::chat::ChatMessage;
use crate::error::{ProviderError, ProviderErrorKind};
use crate::providers::{validate_history, HistoryMessage, Provider};

/// One recorded `complete` call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Catalog id of the model that was called
    pub model_id: String,
    /// Context as received (before validation)
    pub history: Vec<HistoryMessage>,
}

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Fail(ProviderErrorKind, String),
}

/// Provider driven by a per-model script
///
/// Models without a script fail with HTTP 404.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    /// Empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `model_id` with `text`
    pub fn with_reply(self, model_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.set(model_id.into(), Script::Reply(text.into()));
        self
    }

    /// Fail `model_id` with `kind`
    pub fn with_failure(
        self,
        model_id: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        self.set(model_id.into(), Script::Fail(kind, message.into()));
        self
    }

    fn set(&self, model_id: String, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(model_id, script);
        }
    }

    /// Calls received so far, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        model: &ModelDescriptor,
        history: &[HistoryMessage],
    ) -> Result<ChatMessage, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model_id: model.id.clone(),
                history: history.to_vec(),
            });
        }

        validate_history(&model.id, history)?;

        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|scripts| scripts.get(&model.id).cloned());

        match script {
            Some(Script::Reply(text)) => Ok(ChatMessage::assistant(text, model.id.clone())),
            Some(Script::Fail(kind, message)) => Err(ProviderError::new(&model.id, kind, message)),
            None => Err(ProviderError::new(
                &model.id,
                ProviderErrorKind::HttpStatus(404),
                "no script for model",
            )),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
