//! Nymval - multi-model AI chat CLI
//!
#![doc = "Main entry point for the Nymval chat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nymval::cli::{Cli, Commands, ModelCommand};
use nymval::commands;
use nymval::config::{Config, LoggingConfig};
use nymval::error::user_message;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {}", user_message(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Initialize tracing
    init_tracing(&config.logging);

    // Validate configuration
    config.validate()?;

    let user = cli.user.clone();

    match cli.command {
        Commands::Chat { session, models } => {
            if let Some(s) = &session {
                tracing::debug!("Opening session: {}", s);
            }
            commands::chat::run_chat(config, user, session, models).await
        }
        Commands::Send {
            session,
            models,
            json,
            content,
        } => commands::send::run_send(config, user, session, models, content, json).await,
        Commands::Sessions { command } => {
            tracing::info!("Starting session management command");
            let storage = commands::open_storage(&config, user)?;
            commands::sessions::handle_sessions(command, &*storage, &config.models).await
        }
        Commands::Models { command } => match command {
            ModelCommand::List { json } => commands::models::list_models(&config.models, json),
        },
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
