use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatSession;

/// Listing metadata for a stored session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Unique identifier for the session
    pub id: String,
    /// Display title
    pub title: String,
    /// Time of the latest activity
    pub last_message_date: DateTime<Utc>,
    /// Models associated with the session
    pub models: Vec<String>,
    /// Number of messages in the session
    pub message_count: usize,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        let last_message_date = Utc
            .timestamp_millis_opt(session.last_message_date)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            last_message_date,
            models: session.models.clone(),
            message_count: session.messages.len(),
        }
    }
}
