//! Conversation persistence
//!
//! [`ConversationGateway`] is the interface the dispatch pipeline and the
//! CLI use to reach stored conversations. [`SqliteStorage`] is the
//! SQLite-backed implementation.

use async_trait::async_trait;

use crate::chat::{ChatMessage, ChatSession};
use crate::error::Result;

pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStorage;
pub use types::SessionSummary;

/// Access to the current user's stored conversations
///
/// Every operation is scoped to the identity the implementation was built
/// with. Sessions owned by someone else are reported as not found.
#[async_trait]
pub trait ConversationGateway: Send + Sync {
    /// All sessions of the current user, most recently active first,
    /// with messages and model ids loaded
    async fn list_sessions_for_user(&self) -> Result<Vec<ChatSession>>;

    /// Create an empty session associated with `initial_model_id`
    ///
    /// A blank title becomes the placeholder title. Failing to record the
    /// model association is logged and does not fail the call.
    async fn create_session(&self, title: &str, initial_model_id: &str) -> Result<ChatSession>;

    /// One session with its messages and model ids
    async fn get_session(&self, session_id: &str) -> Result<ChatSession>;

    /// Persist `message` at the end of the session and return the stored copy
    ///
    /// The first user message of an untitled session also sets its title.
    async fn append_message(&self, session_id: &str, message: ChatMessage) -> Result<ChatMessage>;

    /// Associate `model_id` with the session; repeated calls are no-ops
    async fn add_session_model(&self, session_id: &str, model_id: &str) -> Result<()>;

    /// Raise the session's last activity time to at least `at`
    async fn touch_session(&self, session_id: &str, at: i64) -> Result<()>;

    /// Delete a session and its messages; `false` when nothing was deleted
    async fn delete_session(&self, session_id: &str) -> Result<bool>;

    /// Change a session's title
    async fn rename_session(&self, session_id: &str, title: &str) -> Result<()>;
}
