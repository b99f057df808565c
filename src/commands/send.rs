//! One-shot send

use std::sync::Arc;

use crate::commands::{
    build_orchestrator, open_storage, print_send_result, resolve_session_id, select_models,
};
use crate::config::Config;
use crate::error::{NymvalError, Result};
use crate::storage::ConversationGateway;

/// Send `content` to `models` in `session` and print the replies
///
/// With `json` the [`SendResult`](crate::chat::SendResult) is printed as
/// pretty JSON instead.
pub async fn run_send(
    config: Config,
    user: Option<String>,
    session: String,
    models: Vec<String>,
    content: String,
    json: bool,
) -> Result<()> {
    let storage = open_storage(&config, user)?;
    let gateway: Arc<dyn ConversationGateway> = storage;
    let orchestrator = build_orchestrator(&config, gateway.clone())?;

    let sessions = gateway.list_sessions_for_user().await?;
    let session_id = resolve_session_id(&sessions, &session)?;
    let models = select_models(&models)?;

    tracing::debug!(session_id = %session_id, models = ?models, "Sending one-shot message");
    let result = orchestrator
        .send_message(&session_id, &content, &models)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).map_err(NymvalError::Serialization)?
        );
    } else {
        print_send_result(orchestrator.catalog(), &models, &result);
    }
    Ok(())
}
