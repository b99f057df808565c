use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::auth::{require_user, IdentityProvider, UserId};
use crate::chat::{derive_title, now_millis, ChatMessage, ChatSession, Role, DEFAULT_SESSION_TITLE};
use crate::config::StorageConfig;
use crate::error::{NymvalError, Result};
use crate::storage::ConversationGateway;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chat_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    last_message_date INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_sessions_user
    ON chat_sessions (user_id, last_message_date DESC);
CREATE TABLE IF NOT EXISTS chat_messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    session_id TEXT NOT NULL REFERENCES chat_sessions (id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
    content TEXT NOT NULL,
    model TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages (session_id, seq);
CREATE TABLE IF NOT EXISTS session_models (
    session_id TEXT NOT NULL REFERENCES chat_sessions (id) ON DELETE CASCADE,
    model_id TEXT NOT NULL CHECK (length(trim(model_id)) > 0),
    PRIMARY KEY (session_id, model_id)
);
";

/// Maps any error into `NymvalError::Storage` with a short context line
trait StorageContext<T> {
    fn storage_context(self, what: &'static str) -> Result<T>;
}

impl<T, E> StorageContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn storage_context(self, what: &'static str) -> Result<T> {
        self.context(what)
            .map_err(|e| anyhow::Error::from(NymvalError::Storage(format!("{:#}", e))))
    }
}

/// SQLite-backed conversation store
///
/// A connection is opened per operation; foreign keys are enabled on each
/// one so deletes cascade.
#[derive(Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
    identity: Arc<dyn IdentityProvider>,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Uses `NYMVAL_HISTORY_DB` when set, else `history.db` in the user's
    /// data directory.
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        if let Ok(override_path) = std::env::var("NYMVAL_HISTORY_DB") {
            return Self::new_with_path(override_path, identity);
        }

        let proj_dirs = ProjectDirs::from("com", "nymval", "nymval")
            .ok_or_else(|| NymvalError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir).storage_context("Failed to create data directory")?;

        Self::new_with_path(data_dir.join("history.db"), identity)
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use nymval::auth::StaticIdentity;
    /// use nymval::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(
    ///     dir.path().join("history.db"),
    ///     Arc::new(StaticIdentity::new("alice")),
    /// )
    /// .unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(
        db_path: P,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .storage_context("Failed to create parent directory for database")?;
        }

        let storage = Self { db_path, identity };
        storage.init()?;
        tracing::debug!("Opened conversation store at {}", storage.db_path.display());
        Ok(storage)
    }

    /// Open the store described by `config`
    pub fn from_config(config: &StorageConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        match &config.path {
            Some(path) => Self::new_with_path(path.clone(), identity),
            None => Self::new(identity),
        }
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)
            .storage_context("Failed to create tables")?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).storage_context("Failed to open database")?;
        conn.busy_timeout(Duration::from_secs(5))
            .storage_context("Failed to set busy timeout")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .storage_context("Failed to enable foreign keys")?;
        Ok(conn)
    }

    fn user(&self) -> Result<UserId> {
        Ok(require_user(self.identity.as_ref())?)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStorage) -> Result<T> + Send + 'static,
    {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || op(&storage))
            .await
            .storage_context("Storage task failed")?
    }

    /// List the current user's sessions, newest activity first
    pub fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        let user = self.user()?;
        let conn = self.connect()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, title, last_message_date FROM chat_sessions
                WHERE user_id = ?1
                ORDER BY last_message_date DESC, created_at DESC, rowid DESC",
            )
            .storage_context("Failed to prepare statement")?;

        let rows = stmt
            .query_map(params![user.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .storage_context("Failed to query sessions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .storage_context("Failed to read session row")?;

        rows.into_iter()
            .map(|(id, title, last_message_date)| -> Result<ChatSession> {
                Ok(ChatSession {
                    messages: load_messages(&conn, &id)?,
                    models: load_models(&conn, &id)?,
                    id,
                    title,
                    last_message_date,
                })
            })
            .collect()
    }

    /// Load one session owned by the current user
    pub fn load_session(&self, session_id: &str) -> Result<ChatSession> {
        let user = self.user()?;
        let conn = self.connect()?;

        let row = conn
            .query_row(
                "SELECT title, last_message_date FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
                params![session_id, user.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .storage_context("Failed to query session")?;

        let (title, last_message_date) = row.ok_or_else(|| not_found(session_id))?;

        Ok(ChatSession {
            id: session_id.to_string(),
            title,
            messages: load_messages(&conn, session_id)?,
            last_message_date,
            models: load_models(&conn, session_id)?,
        })
    }

    /// Create a session for the current user
    pub fn insert_session(&self, title: &str, initial_model_id: &str) -> Result<ChatSession> {
        let user = self.user()?;
        let mut conn = self.connect()?;

        let title = match title.trim() {
            "" => DEFAULT_SESSION_TITLE.to_string(),
            t => t.to_string(),
        };
        let id = Uuid::new_v4().to_string();
        let now = now_millis();

        let tx = conn
            .transaction()
            .storage_context("Failed to start transaction")?;
        tx.execute(
            "INSERT INTO chat_sessions (id, user_id, title, created_at, last_message_date)
            VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, user.as_str(), title, now],
        )
        .storage_context("Failed to insert session")?;

        let mut models = Vec::new();
        match tx.execute(
            "INSERT INTO session_models (session_id, model_id) VALUES (?1, ?2)",
            params![id, initial_model_id],
        ) {
            Ok(_) => models.push(initial_model_id.to_string()),
            Err(e) => tracing::warn!(
                session_id = %id,
                model = initial_model_id,
                "Failed to associate model with new session: {}",
                e
            ),
        }

        tx.commit().storage_context("Failed to commit transaction")?;
        tracing::info!(session_id = %id, "Created session");

        Ok(ChatSession {
            id,
            title,
            messages: Vec::new(),
            last_message_date: now,
            models,
        })
    }

    /// Append a message and return it with its persisted timestamp
    pub fn insert_message(&self, session_id: &str, mut message: ChatMessage) -> Result<ChatMessage> {
        message.validate()?;
        let user = self.user()?;
        let mut conn = self.connect()?;

        let tx = conn
            .transaction()
            .storage_context("Failed to start transaction")?;

        let (title, last_message_date) = tx
            .query_row(
                "SELECT title, last_message_date FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
                params![session_id, user.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .storage_context("Failed to query session")?
            .ok_or_else(|| not_found(session_id))?;

        message.created_at = now_millis().max(last_message_date);

        tx.execute(
            "INSERT INTO chat_messages (id, session_id, role, content, model, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                session_id,
                message.role.as_str(),
                message.content,
                message.model,
                message.created_at
            ],
        )
        .storage_context("Failed to insert message")?;

        if message.role == Role::User && title == DEFAULT_SESSION_TITLE {
            let user_messages: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE session_id = ?1 AND role = 'user'",
                    params![session_id],
                    |row| row.get(0),
                )
                .storage_context("Failed to count messages")?;
            if user_messages == 1 {
                let derived = derive_title(&message.content);
                tx.execute(
                    "UPDATE chat_sessions SET title = ?1 WHERE id = ?2",
                    params![derived, session_id],
                )
                .storage_context("Failed to update title")?;
                tracing::debug!(session_id, title = %derived, "Derived session title");
            }
        }

        tx.execute(
            "UPDATE chat_sessions SET last_message_date = MAX(last_message_date, ?1) WHERE id = ?2",
            params![message.created_at, session_id],
        )
        .storage_context("Failed to update last message date")?;

        tx.commit().storage_context("Failed to commit transaction")?;
        Ok(message)
    }

    /// Associate a model with a session
    pub fn insert_session_model(&self, session_id: &str, model_id: &str) -> Result<()> {
        if model_id.trim().is_empty() {
            return Err(NymvalError::Validation("model id must not be blank".to_string()).into());
        }
        let user = self.user()?;
        let conn = self.connect()?;
        ensure_owned(&conn, session_id, &user)?;

        conn.execute(
            "INSERT OR IGNORE INTO session_models (session_id, model_id) VALUES (?1, ?2)",
            params![session_id, model_id],
        )
        .storage_context("Failed to insert session model")?;
        Ok(())
    }

    /// Raise `last_message_date` to at least `at`
    pub fn bump_last_message_date(&self, session_id: &str, at: i64) -> Result<()> {
        let user = self.user()?;
        let conn = self.connect()?;
        let rows = conn
            .execute(
                "UPDATE chat_sessions SET last_message_date = MAX(last_message_date, ?1)
                WHERE id = ?2 AND user_id = ?3",
                params![at, session_id, user.as_str()],
            )
            .storage_context("Failed to update last message date")?;
        if rows == 0 {
            return Err(not_found(session_id).into());
        }
        Ok(())
    }

    /// Delete a session; messages and model rows cascade
    pub fn remove_session(&self, session_id: &str) -> Result<bool> {
        let user = self.user()?;
        let conn = self.connect()?;
        let rows = conn
            .execute(
                "DELETE FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
                params![session_id, user.as_str()],
            )
            .storage_context("Failed to delete session")?;
        if rows > 0 {
            tracing::info!(session_id, "Deleted session");
        }
        Ok(rows > 0)
    }

    /// Set a session's title
    pub fn update_title(&self, session_id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(NymvalError::Validation("title must not be blank".to_string()).into());
        }
        let user = self.user()?;
        let conn = self.connect()?;
        let rows = conn
            .execute(
                "UPDATE chat_sessions SET title = ?1 WHERE id = ?2 AND user_id = ?3",
                params![title, session_id, user.as_str()],
            )
            .storage_context("Failed to rename session")?;
        if rows == 0 {
            return Err(not_found(session_id).into());
        }
        Ok(())
    }
}

fn not_found(session_id: &str) -> NymvalError {
    NymvalError::NotFound(format!("session '{}'", session_id))
}

fn ensure_owned(conn: &Connection, session_id: &str, user: &UserId) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
            params![session_id, user.as_str()],
            |_| Ok(()),
        )
        .optional()
        .storage_context("Failed to query session")?;
    exists.ok_or_else(|| not_found(session_id).into())
}

fn load_messages(conn: &Connection, session_id: &str) -> Result<Vec<ChatMessage>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, role, content, model, created_at FROM chat_messages
            WHERE session_id = ?1 ORDER BY seq",
        )
        .storage_context("Failed to prepare statement")?;

    let rows = stmt
        .query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .storage_context("Failed to query messages")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .storage_context("Failed to read message row")?;

    rows.into_iter()
        .map(|(id, role, content, model, created_at)| -> Result<ChatMessage> {
            Ok(ChatMessage {
                id,
                role: role.parse::<Role>()?,
                content,
                model,
                created_at,
            })
        })
        .collect()
}

fn load_models(conn: &Connection, session_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT model_id FROM session_models WHERE session_id = ?1 ORDER BY rowid")
        .storage_context("Failed to prepare statement")?;
    let models = stmt
        .query_map(params![session_id], |row| row.get::<_, String>(0))
        .storage_context("Failed to query session models")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .storage_context("Failed to read session model row")?;
    Ok(models)
}

#[async_trait]
impl ConversationGateway for SqliteStorage {
    async fn list_sessions_for_user(&self) -> Result<Vec<ChatSession>> {
        self.blocking(|s| s.list_sessions()).await
    }

    async fn create_session(&self, title: &str, initial_model_id: &str) -> Result<ChatSession> {
        let title = title.to_string();
        let model = initial_model_id.to_string();
        self.blocking(move |s| s.insert_session(&title, &model)).await
    }

    async fn get_session(&self, session_id: &str) -> Result<ChatSession> {
        let id = session_id.to_string();
        self.blocking(move |s| s.load_session(&id)).await
    }

    async fn append_message(&self, session_id: &str, message: ChatMessage) -> Result<ChatMessage> {
        let id = session_id.to_string();
        self.blocking(move |s| s.insert_message(&id, message)).await
    }

    async fn add_session_model(&self, session_id: &str, model_id: &str) -> Result<()> {
        let id = session_id.to_string();
        let model = model_id.to_string();
        self.blocking(move |s| s.insert_session_model(&id, &model)).await
    }

    async fn touch_session(&self, session_id: &str, at: i64) -> Result<()> {
        let id = session_id.to_string();
        self.blocking(move |s| s.bump_last_message_date(&id, at)).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let id = session_id.to_string();
        self.blocking(move |s| s.remove_session(&id)).await
    }

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<()> {
        let id = session_id.to_string();
        let title = title.to_string();
        self.blocking(move |s| s.update_title(&id, &title)).await
    }
}
