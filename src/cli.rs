//! Command-line interface definition for Nymval
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot sends, session
//! management and the model catalog.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nymval - multi-model AI chat client
///
/// Chat with one or more language models side by side and keep the
/// conversation history on disk.
#[derive(Parser, Debug, Clone)]
#[command(name = "nymval")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the conversation database file
    #[arg(long, env = "NYMVAL_HISTORY_DB")]
    pub storage_path: Option<PathBuf>,

    /// User whose conversations are accessed
    #[arg(short, long, env = "NYMVAL_USER")]
    pub user: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Nymval
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Session to open (id or unique id prefix); defaults to the most recent
        #[arg(short, long)]
        session: Option<String>,

        /// Models to send to, comma separated (at most two)
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,
    },

    /// Send one message and print the replies
    Send {
        /// Session id or unique id prefix
        #[arg(short, long)]
        session: String,

        /// Models to send to, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        models: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Message text
        content: String,
    },

    /// Manage stored chat sessions
    Sessions {
        /// Session management subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Inspect the model catalog
    Models {
        /// Model catalog subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions, most recently active first
    List {
        /// Print sessions as JSON
        #[arg(long)]
        json: bool,

        /// Only show sessions whose title contains this text (case-insensitive)
        #[arg(long, value_name = "TEXT")]
        search: Option<String>,
    },

    /// Create an empty session
    New {
        /// Session title
        #[arg(short, long, default_value = "")]
        title: String,

        /// Initial model; defaults to the first catalog entry
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Rename a session
    Rename {
        /// Session id or unique id prefix
        id: String,

        /// New title
        title: String,
    },

    /// Delete a session and its messages
    Delete {
        /// Session id or unique id prefix
        id: String,
    },
}

/// Model catalog subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List available models
    List {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            user: None,
            command: Commands::Models {
                command: ModelCommand::List { json: false },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Models {
                command: ModelCommand::List { json: false }
            }
        ));
    }

    #[test]
    fn test_cli_parse_chat_command() {
        let cli = Cli::try_parse_from(["nymval", "chat"]).unwrap();
        if let Commands::Chat { session, models } = cli.command {
            assert!(session.is_none());
            assert!(models.is_empty());
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_cli_parse_send_with_models() {
        let cli = Cli::try_parse_from([
            "nymval",
            "send",
            "--session",
            "abc123",
            "--models",
            "llama3-70b,qwen-72b",
            "Hello there",
        ])
        .unwrap();
        if let Commands::Send {
            session,
            models,
            json,
            content,
        } = cli.command
        {
            assert_eq!(session, "abc123");
            assert_eq!(models, vec!["llama3-70b", "qwen-72b"]);
            assert!(!json);
            assert_eq!(content, "Hello there");
        } else {
            panic!("Expected Send command");
        }
    }

    #[test]
    fn test_cli_send_requires_models() {
        let cli = Cli::try_parse_from(["nymval", "send", "--session", "abc", "hi"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parse_sessions_list_search() {
        let cli = Cli::try_parse_from(["nymval", "sessions", "list", "--search", "Trip"]).unwrap();
        if let Commands::Sessions {
            command: SessionCommand::List { json, search },
        } = cli.command
        {
            assert!(!json);
            assert_eq!(search.as_deref(), Some("Trip"));
        } else {
            panic!("Expected Sessions List command");
        }

        let cli = Cli::try_parse_from(["nymval", "sessions", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                command: SessionCommand::List { search: None, .. }
            }
        ));
    }

    #[test]
    fn test_cli_parse_sessions_rename() {
        let cli =
            Cli::try_parse_from(["nymval", "sessions", "rename", "abc", "New title"]).unwrap();
        if let Commands::Sessions {
            command: SessionCommand::Rename { id, title },
        } = cli.command
        {
            assert_eq!(id, "abc");
            assert_eq!(title, "New title");
        } else {
            panic!("Expected Sessions Rename command");
        }
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "nymval",
            "--user",
            "alice",
            "--storage-path",
            "/tmp/h.db",
            "-v",
            "models",
            "list",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert_eq!(cli.storage_path, Some(PathBuf::from("/tmp/h.db")));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Models {
                command: ModelCommand::List { json: true }
            }
        ));
    }
}
