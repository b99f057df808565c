//! Core chat data types: sessions, messages, and send results

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NymvalError;

/// Placeholder title given to sessions that have not been named yet
pub const DEFAULT_SESSION_TITLE: &str = "New Conversation";

/// Number of characters of the first user message kept in a derived title
pub const TITLE_PREFIX_CHARS: usize = 30;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user
    User,
    /// Reply produced by a model
    Assistant,
    /// Instruction injected into the context
    System,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = NymvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(NymvalError::Validation(format!("invalid role '{}'", other))),
        }
    }
}

/// A single message in a chat session
///
/// `model` is set exactly when `role` is [`Role::Assistant`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Opaque id, generated before persistence
    pub id: String,
    /// Who wrote the message
    pub role: Role,
    /// Text content
    pub content: String,
    /// Catalog id of the model that produced an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Creation time in epoch milliseconds
    pub created_at: i64,
}

impl ChatMessage {
    /// Create a user message stamped with the local clock
    ///
    /// # Examples
    ///
    /// ```
    /// use nymval::chat::{ChatMessage, Role};
    ///
    /// let msg = ChatMessage::user("hello");
    /// assert_eq!(msg.role, Role::User);
    /// assert!(msg.model.is_none());
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(Role::User, content.into(), None)
    }

    /// Create an assistant message attributed to `model`
    pub fn assistant(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self::build(Role::Assistant, content.into(), Some(model.into()))
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::build(Role::System, content.into(), None)
    }

    fn build(role: Role, content: String, model: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            model,
            created_at: now_millis(),
        }
    }

    /// Check the role/model pairing and that content is not blank
    pub fn validate(&self) -> Result<(), NymvalError> {
        if self.content.trim().is_empty() {
            return Err(NymvalError::Validation(
                "message content must not be blank".to_string(),
            ));
        }
        match (self.role, self.model.as_deref()) {
            (Role::Assistant, None) => Err(NymvalError::Validation(
                "assistant messages must carry a model id".to_string(),
            )),
            (Role::Assistant, Some(m)) if m.trim().is_empty() => Err(NymvalError::Validation(
                "assistant messages must carry a model id".to_string(),
            )),
            (Role::User | Role::System, Some(_)) => Err(NymvalError::Validation(format!(
                "{} messages must not carry a model id",
                self.role
            ))),
            _ => Ok(()),
        }
    }
}

/// A conversation owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Opaque session id
    pub id: String,
    /// Display title
    pub title: String,
    /// Messages in chronological order
    pub messages: Vec<ChatMessage>,
    /// Time of the latest activity in epoch milliseconds
    pub last_message_date: i64,
    /// Catalog ids of models associated with the session
    pub models: Vec<String>,
}

impl ChatSession {
    /// Whether the session has at least one user message
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// Whether the title is still the placeholder
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_SESSION_TITLE
    }
}

/// Outcome of a send: the stored user message and every successful reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    /// The persisted user message
    pub user_message: ChatMessage,
    /// Replies in the order the models were requested
    pub assistant_responses: Vec<ChatMessage>,
}

/// Derive a session title from the first user message
///
/// # Examples
///
/// ```
/// use nymval::chat::derive_title;
///
/// assert_eq!(derive_title("Hi"), "Hi");
/// assert_eq!(
///     derive_title("Explain recursion in plain terms please"),
///     "Explain recursion in plain ter..."
/// );
/// ```
pub fn derive_title(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() > TITLE_PREFIX_CHARS {
        let mut title: String = trimmed.chars().take(TITLE_PREFIX_CHARS).collect();
        title.push_str("...");
        title
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!(matches!(
            "tool".parse::<Role>(),
            Err(NymvalError::Validation(_))
        ));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_message_constructors_generate_unique_ids() {
        let a = ChatMessage::user("one");
        let b = ChatMessage::user("one");
        assert_ne!(a.id, b.id);
        assert!(a.created_at > 0);
    }

    #[test]
    fn test_validate_rejects_blank_content() {
        let msg = ChatMessage::user("   \n");
        assert!(matches!(msg.validate(), Err(NymvalError::Validation(_))));
    }

    #[test]
    fn test_validate_model_role_pairing() {
        assert!(ChatMessage::assistant("hi", "llama3-70b").validate().is_ok());

        let mut orphan = ChatMessage::assistant("hi", "x");
        orphan.model = None;
        assert!(orphan.validate().is_err());

        let mut user = ChatMessage::user("hi");
        user.model = Some("llama3-70b".to_string());
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_derive_title_exactly_thirty_chars_is_kept() {
        let content = "a".repeat(30);
        assert_eq!(derive_title(&content), content);
        let content = "a".repeat(31);
        assert_eq!(derive_title(&content), format!("{}...", "a".repeat(30)));
    }

    #[test]
    fn test_derive_title_counts_characters_not_bytes() {
        let content = "é".repeat(40);
        let title = derive_title(&content);
        assert_eq!(title.chars().count(), 33);
        assert!(title.ends_with("..."));
    }
}
