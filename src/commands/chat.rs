//! Interactive chat mode handler.
//!
//! Loads the user's sessions into a [`SessionCache`], then runs a
//! readline loop. Plain input is sent to the selected models through the
//! orchestrator; `/` commands manage sessions and the model selection.

use std::sync::Arc;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::catalog::ModelCatalog;
use crate::chat::{now_millis, ChatSession, ContextInfo, Orchestrator, SessionCache};
use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::commands::{
    build_orchestrator, models, open_storage, print_send_result, resolve_session_id,
    select_models, sessions, MAX_SELECTED_MODELS,
};
use crate::config::Config;
use crate::error::{user_message, NymvalError, Result};
use crate::providers::HistoryMessage;
use crate::storage::ConversationGateway;

/// Start interactive chat mode
///
/// # Arguments
///
/// * `config` - Global configuration (consumed)
/// * `user` - User whose sessions are opened
/// * `session` - Session id or prefix to open; defaults to the most recent
/// * `requested_models` - Models to send to; defaults to the session's models
pub async fn run_chat(
    config: Config,
    user: Option<String>,
    session: Option<String>,
    requested_models: Vec<String>,
) -> Result<()> {
    tracing::info!("Starting interactive chat mode");

    let storage = open_storage(&config, user)?;
    let gateway: Arc<dyn ConversationGateway> = storage;
    let orchestrator = build_orchestrator(&config, gateway.clone())?;

    let mut cache = SessionCache::from_sessions(gateway.list_sessions_for_user().await?);
    if let Some(wanted) = session {
        let listed: Vec<ChatSession> = cache.sessions().cloned().collect();
        let id = resolve_session_id(&listed, &wanted)?;
        cache = cache.select_session(&id);
    }

    let mut selected = initial_models(&requested_models, cache.active(), orchestrator.catalog())?;

    if cache.is_empty() {
        let created = gateway.create_session("", &selected[0]).await?;
        cache = cache.insert_session(created);
    }

    let mut rl = DefaultEditor::new()?;
    print_welcome_banner(&cache, &selected);

    loop {
        let prompt = format_prompt(cache.active());
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let command = match parse_special_command(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{}\n", e.to_string().red());
                        continue;
                    }
                };

                match command {
                    SpecialCommand::None => {}
                    SpecialCommand::Exit => break,
                    other => {
                        let outcome = handle_special(
                            other,
                            cache,
                            &mut selected,
                            &gateway,
                            &orchestrator,
                            &config,
                        )
                        .await;
                        match outcome {
                            Ok(next) => cache = next,
                            Err((previous, e)) => {
                                tracing::error!("Command failed: {:#}", e);
                                eprintln!("{}\n", user_message(&e).red());
                                cache = previous;
                            }
                        }
                        continue;
                    }
                }

                let Some(session_id) = cache.active_id().map(str::to_string) else {
                    println!("{}", "No active conversation. Use /new to start one.".yellow());
                    continue;
                };

                cache = cache.begin_send(&session_id);
                match orchestrator
                    .send_message(&session_id, trimmed, &selected)
                    .await
                {
                    Ok(result) => {
                        print_send_result(orchestrator.catalog(), &selected, &result);
                        cache = cache.apply_send_result(&session_id, &result, now_millis());
                    }
                    Err(e) => {
                        tracing::error!(session_id = %session_id, "Send failed: {:#}", e);
                        eprintln!("{}\n", user_message(&e).red());
                        cache = cache.finish_send(&session_id);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

type CommandOutcome = std::result::Result<SessionCache, (SessionCache, anyhow::Error)>;

/// Apply a special command; on failure the cache comes back unchanged
async fn handle_special(
    command: SpecialCommand,
    cache: SessionCache,
    selected: &mut Vec<String>,
    gateway: &Arc<dyn ConversationGateway>,
    orchestrator: &Orchestrator,
    config: &Config,
) -> CommandOutcome {
    match command {
        SpecialCommand::New(title) => {
            let title = title.unwrap_or_default();
            match gateway.create_session(&title, &selected[0]).await {
                Ok(created) => {
                    println!("{} {}\n", "Started".green(), created.title);
                    Ok(cache.insert_session(created))
                }
                Err(e) => Err((cache, e)),
            }
        }
        SpecialCommand::ListSessions => {
            let listed: Vec<ChatSession> = cache.sessions().cloned().collect();
            sessions::print_sessions_table(&listed);
            Ok(cache)
        }
        SpecialCommand::Switch(wanted) => {
            let listed: Vec<ChatSession> = cache.sessions().cloned().collect();
            match resolve_session_id(&listed, &wanted) {
                Ok(id) => {
                    let cache = cache.select_session(&id);
                    if let Some(active) = cache.active() {
                        println!("{} {}\n", "Switched to".green(), active.title);
                    }
                    Ok(cache)
                }
                Err(e) => Err((cache, e)),
            }
        }
        SpecialCommand::Rename(title) => {
            let Some(id) = cache.active_id().map(str::to_string) else {
                return Ok(cache);
            };
            match gateway.rename_session(&id, &title).await {
                Ok(()) => Ok(cache.rename_session(&id, &title)),
                Err(e) => Err((cache, e)),
            }
        }
        SpecialCommand::Delete(wanted) => {
            let listed: Vec<ChatSession> = cache.sessions().cloned().collect();
            let target = match wanted {
                Some(w) => resolve_session_id(&listed, &w),
                None => Ok(cache.active_id().unwrap_or_default().to_string()),
            };
            let id = match target {
                Ok(id) if !id.is_empty() => id,
                Ok(_) => return Ok(cache),
                Err(e) => return Err((cache, e)),
            };
            match gateway.delete_session(&id).await {
                Ok(_) => {
                    println!(
                        "{}\n",
                        format!("Deleted session {}", sessions::short_id(&id)).green()
                    );
                    Ok(cache.remove_session(&id))
                }
                Err(e) => Err((cache, e)),
            }
        }
        SpecialCommand::ListModels => {
            match models::list_models(orchestrator.catalog(), false) {
                Ok(()) => Ok(cache),
                Err(e) => Err((cache, e)),
            }
        }
        SpecialCommand::UseModels(requested) => {
            match validated_selection(&requested, orchestrator.catalog()) {
                Ok(models) => {
                    *selected = models;
                    println!("{} {}\n", "Sending to".green(), selected.join(", ").cyan());
                    Ok(cache)
                }
                Err(e) => Err((cache, e)),
            }
        }
        SpecialCommand::ContextInfo => {
            if let Some(active) = cache.active() {
                print_context_info(active, selected, orchestrator.catalog(), config);
            }
            Ok(cache)
        }
        SpecialCommand::Help => {
            print_help();
            Ok(cache)
        }
        SpecialCommand::Exit | SpecialCommand::None => Ok(cache),
    }
}

/// Selection checked against the catalog
fn validated_selection(requested: &[String], catalog: &ModelCatalog) -> Result<Vec<String>> {
    let models = select_models(requested)?;
    if let Some(unknown) = models.iter().find(|m| catalog.get(m).is_none()) {
        return Err(NymvalError::InvalidRequest(format!(
            "unknown model '{}'",
            unknown
        ))
        .into());
    }
    Ok(models)
}

/// Models to start with: explicit request, else the session's, else the
/// first catalog entry
fn initial_models(
    requested: &[String],
    active: Option<&ChatSession>,
    catalog: &ModelCatalog,
) -> Result<Vec<String>> {
    if !requested.is_empty() {
        return validated_selection(requested, catalog);
    }

    let from_session: Vec<String> = active
        .map(|s| {
            s.models
                .iter()
                .filter(|m| catalog.get(m).is_some())
                .take(MAX_SELECTED_MODELS)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    if !from_session.is_empty() {
        return Ok(from_session);
    }

    catalog
        .first()
        .map(|m| vec![m.id.clone()])
        .ok_or_else(|| NymvalError::Config("model catalog is empty".into()).into())
}

fn format_prompt(active: Option<&ChatSession>) -> String {
    let title = active.map(|s| s.title.as_str()).unwrap_or("no session");
    format!("[{}] >> ", title.cyan())
}

fn print_welcome_banner(cache: &SessionCache, selected: &[String]) {
    println!("{}", "Nymval multi-model chat".bold());
    println!("Conversations: {}", cache.len());
    println!("Sending to: {}", selected.join(", ").cyan());
    println!("Type {} for commands.\n", "/help".cyan());
}

fn print_context_info(
    session: &ChatSession,
    selected: &[String],
    catalog: &ModelCatalog,
    config: &Config,
) {
    let history: Vec<HistoryMessage> = session.messages.iter().map(HistoryMessage::from).collect();
    for id in selected {
        let Some(model) = catalog.get(id) else {
            continue;
        };
        let info = ContextInfo::for_history(
            &history,
            model.context_budget(config.generation.context_budget),
        );
        println!(
            "{}: {} / {} tokens ({:.1}% used, {} remaining)",
            model.name.bold(),
            info.used_tokens,
            info.max_tokens,
            info.percentage_used,
            info.remaining_tokens
        );
    }
    println!();
}
