//! Fixed session identity
//!
//! One identity for the lifetime of the process, used by the stdio transport.

use crate::error::SessionError;
use crate::model::UserId;
use crate::session::identity::{IdValidator, Identity, Role};
use crate::session::provider::SessionProvider;
use async_trait::async_trait;

/// Session provider that always reports the same identity
#[derive(Debug, Clone)]
pub struct FixedSession {
    identity: Identity,
}

impl FixedSession {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// Create from raw user id and role strings
    pub fn parse(user_id: &str, role: &str, ids: &IdValidator) -> Result<Self, SessionError> {
        let user_id = ids.user_id(user_id)?;
        let role = role.parse()?;
        Ok(Self::new(Identity { user_id, role }))
    }

    /// Create from environment variables
    ///
    /// Reads BOOKGATE_USER_ID and BOOKGATE_USER_ROLE (role defaults to reader).
    pub fn from_env(ids: &IdValidator) -> Result<Self, SessionError> {
        let user_id = match std::env::var("BOOKGATE_USER_ID") {
            Ok(user_id) if !user_id.is_empty() => user_id,
            _ => return Err(SessionError::NotConfigured),
        };
        let role = std::env::var("BOOKGATE_USER_ROLE").unwrap_or_else(|_| "reader".to_string());
        Self::parse(&user_id, &role, ids)
    }
}

#[async_trait]
impl SessionProvider for FixedSession {
    async fn current_user_id(&self) -> Result<UserId, SessionError> {
        Ok(self.identity.user_id.clone())
    }

    async fn current_user_role(&self) -> Result<Role, SessionError> {
        Ok(self.identity.role)
    }

    async fn identity(&self) -> Result<Identity, SessionError> {
        Ok(self.identity.clone())
    }

    fn source(&self) -> &'static str {
        "fixed"
    }
}
