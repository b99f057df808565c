//! Nymval - multi-model AI chat library
//!
//! This library provides the core of the Nymval chat client: a user
//! message is stored, sent to one or more models concurrently, and every
//! reply that arrives is stored next to it.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: Identity of the user whose conversations are accessed
//! - `catalog`: Selectable models and their token limits
//! - `chat`: Message types, context fitting, send orchestration, client cache
//! - `providers`: Model provider abstraction and the OpenRouter client
//! - `storage`: Conversation gateway and its SQLite implementation
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use nymval::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod providers;
pub mod storage;

// Re-export commonly used types
pub use catalog::{ModelCatalog, ModelDescriptor};
pub use chat::{ChatMessage, ChatSession, Orchestrator, SendResult};
pub use config::Config;
pub use error::{NymvalError, Result};

#[cfg(test)]
pub mod test_utils;
