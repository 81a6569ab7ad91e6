use crate::role::{Role, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const TOKEN_MAX_LEN: usize = 128;
pub const USERNAME_MAX_LEN: usize = 64;

/// Opaque session credential as read from the request cookie.
///
/// Parsing rejects rather than trims: a token with surrounding whitespace
/// or non-graphic characters never reaches the session store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if input.is_empty() {
            return Err(ValidationError("session token must not be empty".to_string()));
        }
        if input.len() > TOKEN_MAX_LEN {
            return Err(ValidationError(format!(
                "session token exceeds max length {TOKEN_MAX_LEN}"
            )));
        }
        if !input
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ValidationError(
                "session token must match [A-Za-z0-9_-]+".to_string(),
            ));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session row as seen by the gate. Read-only from the gate's
/// perspective; only the auth handlers create or deactivate sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: String,
    pub role: Role,
    pub is_active: bool,
}

impl SessionRecord {
    /// The one condition under which the gate grants a maintenance bypass.
    #[must_use]
    pub fn grants_admin(&self) -> bool {
        self.is_active && self.role == Role::Admin
    }
}

/// An account row backing the login route. The gate never reads accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: String,
    pub username: String,
    pub password_hmac: String,
    pub role: Role,
    pub is_active: bool,
}
