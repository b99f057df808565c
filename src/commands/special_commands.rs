//! Special commands parser for interactive chat mode
//!
//! Commands are prefixed with `/` and the command word is case-insensitive.
//! Arguments (titles, session ids, model ids) keep the case they were typed
//! with.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These act on the session list or the model selection instead of being
/// sent to the models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a new session, optionally titled
    New(Option<String>),

    /// List the user's sessions
    ListSessions,

    /// Make another session active (id or unique prefix)
    Switch(String),

    /// Rename the active session
    Rename(String),

    /// Delete a session; the active one when no id is given
    Delete(Option<String>),

    /// List the model catalog
    ListModels,

    /// Replace the selected models
    UseModels(Vec<String>),

    /// Show context usage of the active session per selected model
    ContextInfo,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; send the input as a message
    None,
}

fn split_command(trimmed: &str) -> (String, &str) {
    match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (trimmed.to_lowercase(), ""),
    }
}

fn required(command: &str, usage: &str, arg: &str) -> Result<String, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(arg.to_string())
    }
}

fn no_argument(
    command: &str,
    arg: &str,
    parsed: SpecialCommand,
) -> Result<SpecialCommand, CommandError> {
    if arg.is_empty() {
        Ok(parsed)
    } else {
        Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        })
    }
}

/// Parse a user input string into a special command
///
/// # Returns
///
/// `SpecialCommand::None` for input that should be sent as a message
///
/// # Errors
///
/// Returns `CommandError` for unknown commands and malformed arguments.
///
/// # Examples
///
/// ```
/// use nymval::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(
///     parse_special_command("/rename Trip plans").unwrap(),
///     SpecialCommand::Rename("Trip plans".to_string())
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if lower == "exit" || lower == "quit" {
        return Ok(SpecialCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (command, arg) = split_command(trimmed);

    match command.as_str() {
        "/new" => Ok(SpecialCommand::New(
            Some(arg.to_string()).filter(|a| !a.is_empty()),
        )),
        "/sessions" | "/ls" => no_argument("/sessions", arg, SpecialCommand::ListSessions),
        "/switch" | "/open" => Ok(SpecialCommand::Switch(required(
            "/switch",
            "/switch <session_id>",
            arg,
        )?)),
        "/rename" => Ok(SpecialCommand::Rename(required(
            "/rename",
            "/rename <title>",
            arg,
        )?)),
        "/delete" => Ok(SpecialCommand::Delete(
            Some(arg.to_string()).filter(|a| !a.is_empty()),
        )),
        "/models" => no_argument("/models", arg, SpecialCommand::ListModels),
        "/use" => {
            let models: Vec<String> = required("/use", "/use <model>[,<model>]", arg)?
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            Ok(SpecialCommand::UseModels(models))
        }
        "/context" => no_argument("/context", arg, SpecialCommand::ContextInfo),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(command)),
    }
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

SESSIONS:
  /new [title]        - Start a new conversation
  /sessions           - List your conversations (/ls)
  /switch <id>        - Open another conversation by id or id prefix
  /rename <title>     - Rename the current conversation
  /delete [id]        - Delete a conversation (current one by default)

MODELS:
  /models             - Show the model catalog
  /use <a>[,<b>]      - Send to one or two models
  /context            - Show context usage for the selected models

SESSION CONTROL:
  /help               - Show this help message
  /?                  - Same as /help
  exit                - Exit interactive mode
  quit                - Same as exit

NOTES:
  - Command names are case-insensitive
  - Regular text (not starting with /) is sent to every selected model
  - A model that fails does not stop the others from answering
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_regular_text_returns_none() {
        assert_eq!(
            parse_special_command("What is Rust?").unwrap(),
            SpecialCommand::None
        );
        assert_eq!(parse_special_command("   ").unwrap(), SpecialCommand::None);
    }

    #[test]
    fn test_parse_exit_variants() {
        for input in ["exit", "QUIT", "/exit", "/Quit"] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_parse_new_with_and_without_title() {
        assert_eq!(
            parse_special_command("/new").unwrap(),
            SpecialCommand::New(None)
        );
        assert_eq!(
            parse_special_command("/NEW  Rust Questions ").unwrap(),
            SpecialCommand::New(Some("Rust Questions".to_string()))
        );
    }

    #[test]
    fn test_parse_rename_keeps_case() {
        assert_eq!(
            parse_special_command("/Rename My Title").unwrap(),
            SpecialCommand::Rename("My Title".to_string())
        );
    }

    #[test]
    fn test_parse_rename_missing_argument() {
        let err = parse_special_command("/rename").unwrap_err();
        assert!(matches!(err, CommandError::MissingArgument { .. }));
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(
            parse_special_command("/switch ab12").unwrap(),
            SpecialCommand::Switch("ab12".to_string())
        );
        assert!(parse_special_command("/switch").is_err());
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(
            parse_special_command("/delete").unwrap(),
            SpecialCommand::Delete(None)
        );
        assert_eq!(
            parse_special_command("/delete ab12").unwrap(),
            SpecialCommand::Delete(Some("ab12".to_string()))
        );
    }

    #[test]
    fn test_parse_use_models_comma_and_space() {
        assert_eq!(
            parse_special_command("/use llama3-70b, qwen-72b").unwrap(),
            SpecialCommand::UseModels(vec!["llama3-70b".to_string(), "qwen-72b".to_string()])
        );
        assert!(matches!(
            parse_special_command("/use").unwrap_err(),
            CommandError::MissingArgument { .. }
        ));
    }

    #[test]
    fn test_parse_no_argument_commands() {
        assert_eq!(
            parse_special_command("/sessions").unwrap(),
            SpecialCommand::ListSessions
        );
        assert_eq!(
            parse_special_command("/ls").unwrap(),
            SpecialCommand::ListSessions
        );
        assert_eq!(
            parse_special_command("/models").unwrap(),
            SpecialCommand::ListModels
        );
        assert_eq!(
            parse_special_command("/context").unwrap(),
            SpecialCommand::ContextInfo
        );
        assert_eq!(parse_special_command("/?").unwrap(), SpecialCommand::Help);

        let err = parse_special_command("/models extra").unwrap_err();
        assert_eq!(
            err,
            CommandError::UnsupportedArgument {
                command: "/models".to_string(),
                arg: "extra".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        let err = parse_special_command("/frobnicate now").unwrap_err();
        assert_eq!(err, CommandError::UnknownCommand("/frobnicate".to_string()));
    }
}
