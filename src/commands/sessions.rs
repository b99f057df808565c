use colored::Colorize;
use prettytable::{format, Table};

use crate::catalog::ModelCatalog;
use crate::chat::ChatSession;
use crate::cli::SessionCommand;
use crate::commands::resolve_session_id;
use crate::error::{NymvalError, Result};
use crate::storage::{ConversationGateway, SessionSummary};

const TITLE_COLUMN_CHARS: usize = 40;

/// Handle session management commands
pub async fn handle_sessions(
    command: SessionCommand,
    gateway: &dyn ConversationGateway,
    catalog: &ModelCatalog,
) -> Result<()> {
    match command {
        SessionCommand::List { json, search } => {
            let sessions =
                filter_by_title(gateway.list_sessions_for_user().await?, search.as_deref());
            if json {
                println!("{}", sessions_json(&sessions)?);
            } else {
                print_sessions_table(&sessions);
            }
        }
        SessionCommand::New { title, model } => {
            let model_id = match model {
                Some(m) => m,
                None => catalog
                    .first()
                    .map(|m| m.id.clone())
                    .ok_or_else(|| NymvalError::Config("model catalog is empty".to_string()))?,
            };
            let session = gateway.create_session(&title, &model_id).await?;
            println!(
                "{} {} ({})",
                "Created session".green(),
                session.id.cyan(),
                session.title
            );
        }
        SessionCommand::Rename { id, title } => {
            let sessions = gateway.list_sessions_for_user().await?;
            let id = resolve_session_id(&sessions, &id)?;
            gateway.rename_session(&id, &title).await?;
            println!("{}", format!("Renamed session {}", short_id(&id)).green());
        }
        SessionCommand::Delete { id } => {
            let sessions = gateway.list_sessions_for_user().await?;
            let id = resolve_session_id(&sessions, &id)?;
            if gateway.delete_session(&id).await? {
                println!("{}", format!("Deleted session {}", short_id(&id)).green());
            } else {
                println!("{}", format!("Session {} was already gone", short_id(&id)).yellow());
            }
        }
    }

    Ok(())
}

/// Keep sessions whose title contains `search`, ignoring case
///
/// A missing or blank search keeps everything. Order is preserved.
pub fn filter_by_title(sessions: Vec<ChatSession>, search: Option<&str>) -> Vec<ChatSession> {
    let needle = match search.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => return sessions,
    };
    sessions
        .into_iter()
        .filter(|s| s.title.to_lowercase().contains(&needle))
        .collect()
}

/// Session summaries as pretty JSON
pub fn sessions_json(sessions: &[ChatSession]) -> Result<String> {
    let summaries: Vec<SessionSummary> = sessions.iter().map(SessionSummary::from).collect();
    Ok(serde_json::to_string_pretty(&summaries).map_err(NymvalError::Serialization)?)
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn clip_title(title: &str) -> String {
    if title.chars().count() > TITLE_COLUMN_CHARS {
        let head: String = title.chars().take(TITLE_COLUMN_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

/// Print sessions in a bordered table
pub fn print_sessions_table(sessions: &[ChatSession]) {
    if sessions.is_empty() {
        println!("{}", "No conversations yet.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Models".bold(),
        "Messages".bold(),
        "Last Message".bold()
    ]);

    for session in sessions {
        let summary = SessionSummary::from(session);
        let models = if summary.models.is_empty() {
            "-".to_string()
        } else {
            summary.models.join(", ")
        };
        let updated = summary
            .last_message_date
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(prettytable::row![
            short_id(&summary.id).cyan(),
            clip_title(&summary.title),
            models,
            summary.message_count,
            updated
        ]);
    }

    println!("\nConversations:");
    table.printstd();
    println!();
    println!(
        "Use {} to continue a conversation.",
        "nymval chat --session <ID>".cyan()
    );
    println!();
}
