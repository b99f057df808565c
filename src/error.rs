//! Error types for Nymval
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use std::fmt;

use thiserror::Error;

/// Main error type for Nymval operations
///
/// This enum encompasses all possible errors that can occur while
/// validating send requests, talking to model providers, persisting
/// conversations, and loading configuration.
#[derive(Error, Debug)]
pub enum NymvalError {
    /// The caller supplied a malformed request (blank id, blank content, no models)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No authenticated identity is available for the operation
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The referenced session does not exist for the current user
    #[error("Not found: {0}")]
    NotFound(String),

    /// A value failed validation before it reached the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single model provider call failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Every selected model failed for one send
    #[error("All {attempted} selected model(s) failed")]
    AllModelsFailed {
        /// Number of models the send was dispatched to
        attempted: usize,
        /// The last provider failure observed
        #[source]
        last: ProviderError,
    },

    /// Conversation storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl NymvalError {
    /// Short message that is safe to show to an end user.
    ///
    /// Full details (upstream bodies, SQL errors, paths) belong in the logs,
    /// not on screen.
    pub fn user_message(&self) -> &'static str {
        match self {
            NymvalError::InvalidRequest(_) | NymvalError::Validation(_) => {
                "The request was incomplete or invalid. Please check your input."
            }
            NymvalError::Authentication(_) => "You need to sign in to do that.",
            NymvalError::NotFound(_) => "That conversation could not be found.",
            NymvalError::Provider(_) | NymvalError::AllModelsFailed { .. } => {
                "Failed to get a response from the selected model(s). Please try again."
            }
            NymvalError::Storage(_) => "Failed to save or load your conversation.",
            NymvalError::Config(_) | NymvalError::Yaml(_) => {
                "The configuration is invalid. Check your config file."
            }
            NymvalError::MissingCredentials(_) => {
                "No API key is configured for the model provider."
            }
            NymvalError::Io(_) | NymvalError::Serialization(_) => {
                "Something went wrong. Please try again."
            }
        }
    }
}

/// Generic user-facing message for any error in an `anyhow` chain
pub fn user_message(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<NymvalError>() {
        Some(e) => e.user_message(),
        None => match err.downcast_ref::<ProviderError>() {
            Some(_) => "Failed to get a response from the selected model(s). Please try again.",
            None => "Something went wrong. Please try again.",
        },
    }
}

/// Classification of a single provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Model id not present in the catalog
    UnknownModel,
    /// No messages to send
    EmptyHistory,
    /// A message role outside user/assistant/system
    InvalidRole,
    /// Blank text or a malformed multi-part item
    InvalidContent,
    /// Connection, timeout or other transport failure
    Transport,
    /// Provider answered with a non-2xx status
    HttpStatus(u16),
    /// Response body was not JSON
    MalformedBody,
    /// Response JSON carried no recognizable reply
    UnrecognizedShape,
}

impl ProviderErrorKind {
    /// Low-cardinality label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            ProviderErrorKind::UnknownModel => "unknown_model",
            ProviderErrorKind::EmptyHistory => "empty_history",
            ProviderErrorKind::InvalidRole => "invalid_role",
            ProviderErrorKind::InvalidContent => "invalid_content",
            ProviderErrorKind::Transport => "transport",
            ProviderErrorKind::HttpStatus(_) => "http_status",
            ProviderErrorKind::MalformedBody => "malformed_body",
            ProviderErrorKind::UnrecognizedShape => "unrecognized_shape",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::UnknownModel => write!(f, "unknown model"),
            ProviderErrorKind::EmptyHistory => write!(f, "empty history"),
            ProviderErrorKind::InvalidRole => write!(f, "invalid role"),
            ProviderErrorKind::InvalidContent => write!(f, "invalid content"),
            ProviderErrorKind::Transport => write!(f, "transport"),
            ProviderErrorKind::HttpStatus(code) => write!(f, "http {}", code),
            ProviderErrorKind::MalformedBody => write!(f, "malformed body"),
            ProviderErrorKind::UnrecognizedShape => write!(f, "unrecognized response shape"),
        }
    }
}

/// A failure from one model, tagged with that model's id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("model '{model}' failed ({kind}): {message}")]
pub struct ProviderError {
    /// Catalog id of the model that failed
    pub model: String,
    /// What went wrong
    pub kind: ProviderErrorKind,
    /// Detail for logs
    pub message: String,
}

impl ProviderError {
    /// Create a new provider error
    pub fn new(model: impl Into<String>, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias for Nymval operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
