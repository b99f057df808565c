//! Client-side session cache
//!
//! [`SessionCache`] mirrors the sessions a client is showing. Every change
//! goes through a reducer that consumes the cache and returns the next one,
//! so state transitions are plain values that are easy to test.
//!
//! Applying a send result does not re-fetch from storage. Server-side
//! timestamps and titles may therefore drift from the cached copy until the
//! next full reload with [`SessionCache::from_sessions`].

use std::collections::{HashMap, HashSet};

use crate::chat::types::{derive_title, ChatSession, Role, SendResult};

/// Sessions keyed by id, in display order, with selection and loading state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCache {
    sessions: HashMap<String, ChatSession>,
    order: Vec<String>,
    active: Option<String>,
    loading: HashSet<String>,
}

impl SessionCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a listing; the first session becomes active
    pub fn from_sessions(sessions: Vec<ChatSession>) -> Self {
        let order: Vec<String> = sessions.iter().map(|s| s.id.clone()).collect();
        let active = order.first().cloned();
        Self {
            sessions: sessions.into_iter().map(|s| (s.id.clone(), s)).collect(),
            order,
            active,
            loading: HashSet::new(),
        }
    }

    /// Merge a send result into `session_id`
    ///
    /// Appends the user message and the replies, sets `last_message_date`
    /// to `now`, and adds the replying models to the session's model list.
    /// Unknown sessions are left untouched.
    pub fn apply_send_result(mut self, session_id: &str, result: &SendResult, now: i64) -> Self {
        if let Some(session) = self.sessions.get_mut(session_id) {
            let first_user_message = !session.has_user_message();

            session.messages.push(result.user_message.clone());
            session
                .messages
                .extend(result.assistant_responses.iter().cloned());
            session.last_message_date = session.last_message_date.max(now);

            for model in result
                .assistant_responses
                .iter()
                .filter_map(|m| m.model.as_ref())
            {
                if !session.models.contains(model) {
                    session.models.push(model.clone());
                }
            }

            if first_user_message
                && session.has_default_title()
                && result.user_message.role == Role::User
            {
                session.title = derive_title(&result.user_message.content);
            }
        }
        self.loading.remove(session_id);
        self
    }

    /// Drop a session; if it was active, select the first remaining one
    pub fn remove_session(mut self, session_id: &str) -> Self {
        self.sessions.remove(session_id);
        self.order.retain(|id| id != session_id);
        self.loading.remove(session_id);
        if self.active.as_deref() == Some(session_id) {
            self.active = self.order.first().cloned();
        }
        self
    }

    /// Add a session at the front and make it active
    pub fn insert_session(mut self, session: ChatSession) -> Self {
        let id = session.id.clone();
        self.order.retain(|existing| existing != &id);
        self.order.insert(0, id.clone());
        self.sessions.insert(id.clone(), session);
        self.active = Some(id);
        self
    }

    /// Change a cached session's title
    pub fn rename_session(mut self, session_id: &str, title: &str) -> Self {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.title = title.trim().to_string();
        }
        self
    }

    /// Make `session_id` active if it is cached
    pub fn select_session(mut self, session_id: &str) -> Self {
        if self.sessions.contains_key(session_id) {
            self.active = Some(session_id.to_string());
        }
        self
    }

    /// Mark a send as in flight
    pub fn begin_send(mut self, session_id: &str) -> Self {
        if self.sessions.contains_key(session_id) {
            self.loading.insert(session_id.to_string());
        }
        self
    }

    /// Clear the in-flight flag without applying a result
    pub fn finish_send(mut self, session_id: &str) -> Self {
        self.loading.remove(session_id);
        self
    }

    /// Active session id
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Active session
    pub fn active(&self) -> Option<&ChatSession> {
        self.active.as_ref().and_then(|id| self.sessions.get(id))
    }

    /// Session by id
    pub fn get(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions.get(session_id)
    }

    /// Sessions in display order
    pub fn sessions(&self) -> impl Iterator<Item = &ChatSession> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    /// Whether a send is in flight for `session_id`
    pub fn is_loading(&self, session_id: &str) -> bool {
        self.loading.contains(session_id)
    }

    /// Number of cached sessions
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
