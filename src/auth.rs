//! Identity boundary
//!
//! Authentication itself lives outside this crate. Everything that touches
//! stored conversations asks an [`IdentityProvider`] who the current user is
//! and refuses to proceed when nobody is signed in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NymvalError;

/// Environment variable read by [`StaticIdentity::from_env`]
pub const USER_ENV_VAR: &str = "NYMVAL_USER";

/// Opaque identifier of an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw user id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the current user's identity
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any
    fn current_user(&self) -> Option<UserId>;
}

/// Fixed identity decided at startup
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<UserId>,
}

impl StaticIdentity {
    /// Identity for a known user
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: Some(UserId::new(user)),
        }
    }

    /// No signed-in user
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    /// Identity from an optional value; blank counts as anonymous
    pub fn from_option(user: Option<String>) -> Self {
        match user {
            Some(u) if !u.trim().is_empty() => Self::new(u.trim()),
            _ => Self::anonymous(),
        }
    }

    /// Identity from `NYMVAL_USER`
    pub fn from_env() -> Self {
        Self::from_option(std::env::var(USER_ENV_VAR).ok())
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }
}

/// Resolve the current user or fail with an authentication error
pub fn require_user(identity: &dyn IdentityProvider) -> Result<UserId, NymvalError> {
    identity
        .current_user()
        .ok_or_else(|| NymvalError::Authentication("no authenticated user".to_string()))
}
