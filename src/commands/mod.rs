/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`     - Interactive chat loop over the session cache
- `send`     - One-shot send to one or more models
- `sessions` - List, create, rename and delete stored sessions
- `models`   - Print the model catalog

The handlers are thin: persistence goes through the conversation gateway
and sends go through the orchestrator.
*/

use std::sync::Arc;

use colored::Colorize;

use crate::auth::StaticIdentity;
use crate::catalog::ModelCatalog;
use crate::chat::{ChatMessage, ChatSession, DispatchOptions, Orchestrator, SendResult};
use crate::config::Config;
use crate::error::{NymvalError, Result};
use crate::providers::create_provider;
use crate::storage::{ConversationGateway, SqliteStorage};

pub mod chat;
pub mod models;
pub mod send;
pub mod sessions;
pub mod special_commands;

/// Most models a single send may target from the CLI
pub const MAX_SELECTED_MODELS: usize = 2;

/// Open the conversation store for `user`
pub fn open_storage(config: &Config, user: Option<String>) -> Result<Arc<SqliteStorage>> {
    let identity = Arc::new(StaticIdentity::from_option(user));
    Ok(Arc::new(SqliteStorage::from_config(&config.storage, identity)?))
}

/// Build an orchestrator with the configured provider
pub fn build_orchestrator(
    config: &Config,
    gateway: Arc<dyn ConversationGateway>,
) -> Result<Orchestrator> {
    let provider = create_provider(&config.provider, &config.generation)?;
    Ok(Orchestrator::new(
        gateway,
        Arc::from(provider),
        config.models.clone(),
        DispatchOptions::from_config(config),
    ))
}

/// Resolve a full session id or a unique prefix of one
///
/// # Errors
///
/// `NotFound` when nothing matches, `InvalidRequest` when the prefix is
/// ambiguous
pub fn resolve_session_id(sessions: &[ChatSession], id_or_prefix: &str) -> Result<String> {
    let needle = id_or_prefix.trim();
    if needle.is_empty() {
        return Err(NymvalError::InvalidRequest("session id is required".to_string()).into());
    }

    if let Some(exact) = sessions.iter().find(|s| s.id == needle) {
        return Ok(exact.id.clone());
    }

    let matches: Vec<&ChatSession> = sessions.iter().filter(|s| s.id.starts_with(needle)).collect();
    match matches.as_slice() {
        [only] => Ok(only.id.clone()),
        [] => Err(NymvalError::NotFound(format!("session '{}'", needle)).into()),
        _ => Err(NymvalError::InvalidRequest(format!(
            "session prefix '{}' matches {} sessions",
            needle,
            matches.len()
        ))
        .into()),
    }
}

/// Normalize a model selection: trim, drop blanks and duplicates, cap at two
///
/// # Errors
///
/// `InvalidRequest` when nothing remains or too many models are selected
pub fn select_models(requested: &[String]) -> Result<Vec<String>> {
    let mut selected: Vec<String> = Vec::new();
    for id in requested.iter().map(|m| m.trim()).filter(|m| !m.is_empty()) {
        if !selected.iter().any(|s| s == id) {
            selected.push(id.to_string());
        }
    }

    if selected.is_empty() {
        return Err(NymvalError::InvalidRequest("select at least one model".to_string()).into());
    }
    if selected.len() > MAX_SELECTED_MODELS {
        return Err(NymvalError::InvalidRequest(format!(
            "select at most {} models, got {}",
            MAX_SELECTED_MODELS,
            selected.len()
        ))
        .into());
    }
    Ok(selected)
}

fn model_label(catalog: &ModelCatalog, message: &ChatMessage) -> String {
    let id = message.model.as_deref().unwrap_or("assistant");
    catalog
        .get(id)
        .map(|m| m.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Print each reply under its model's display name
pub fn print_send_result(catalog: &ModelCatalog, requested: &[String], result: &SendResult) {
    for reply in &result.assistant_responses {
        println!("\n{}", model_label(catalog, reply).bold().cyan());
        println!("{}", reply.content);
    }

    let failed: Vec<&String> = requested
        .iter()
        .filter(|id| {
            !result
                .assistant_responses
                .iter()
                .any(|r| r.model.as_deref() == Some(id.as_str()))
        })
        .collect();
    for id in failed {
        let name = catalog.get(id).map(|m| m.name.as_str()).unwrap_or(id.as_str());
        println!("\n{}", format!("{} did not respond.", name).yellow());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> ChatSession {
        ChatSession {
            id: id.to_string(),
            title: "t".to_string(),
            messages: Vec::new(),
            last_message_date: 0,
            models: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_session_id() {
        let sessions = vec![session("abc12345-x"), session("abd99999-y")];
        assert_eq!(resolve_session_id(&sessions, "abc").unwrap(), "abc12345-x");
        assert_eq!(
            resolve_session_id(&sessions, "abd99999-y").unwrap(),
            "abd99999-y"
        );

        let err = resolve_session_id(&sessions, "ab").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NymvalError>(),
            Some(NymvalError::InvalidRequest(_))
        ));

        let err = resolve_session_id(&sessions, "zzz").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NymvalError>(),
            Some(NymvalError::NotFound(_))
        ));
    }

    #[test]
    fn test_select_models() {
        let picked = select_models(&[
            " llama3-70b ".to_string(),
            "llama3-70b".to_string(),
            "".to_string(),
            "qwen-72b".to_string(),
        ])
        .unwrap();
        assert_eq!(picked, vec!["llama3-70b", "qwen-72b"]);

        assert!(select_models(&[]).is_err());
        assert!(select_models(&["a".to_string(), "b".to_string(), "c".to_string()]).is_err());
    }
}
