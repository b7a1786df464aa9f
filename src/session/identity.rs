//! Identity and role types

use crate::error::{AccessError, ConfigError, SessionError};
use crate::model::{BookId, UserId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of the calling user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Reader,
    Librarian,
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reader" | "user" => Ok(Role::Reader),
            "librarian" => Ok(Role::Librarian),
            _ => Err(SessionError::UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => f.write_str("reader"),
            Role::Librarian => f.write_str("librarian"),
        }
    }
}

/// Who is making a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn reader(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Reader)
    }

    pub fn librarian(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Librarian)
    }

    pub fn is_librarian(&self) -> bool {
        self.role == Role::Librarian
    }

    /// Fail with `Forbidden` unless the caller is a librarian
    pub fn require_librarian(&self, action: &'static str) -> Result<(), AccessError> {
        if self.is_librarian() {
            Ok(())
        } else {
            Err(AccessError::Forbidden {
                action,
                required: "librarian",
            })
        }
    }
}

/// Validates user and book identifiers arriving from outside
#[derive(Debug, Clone)]
pub struct IdValidator {
    pattern: Regex,
}

impl IdValidator {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern })
    }

    pub fn is_valid(&self, id: &str) -> bool {
        self.pattern.is_match(id)
    }

    pub fn user_id(&self, raw: &str) -> Result<UserId, SessionError> {
        if self.is_valid(raw) {
            Ok(UserId::new(raw))
        } else {
            Err(SessionError::InvalidUserId(raw.to_string()))
        }
    }

    pub fn book_id(&self, raw: &str) -> Result<BookId, AccessError> {
        if self.is_valid(raw) {
            Ok(BookId::new(raw))
        } else {
            Err(AccessError::validation(
                "book_id",
                format!("'{}' is not a valid book id", raw),
            ))
        }
    }
}
