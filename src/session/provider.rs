//! Session provider trait
//!
//! Identity sources are injected collaborators. The stdio transport uses a
//! fixed identity from configuration; the HTTP transport builds one per
//! request from headers.

use crate::error::SessionError;
use crate::model::UserId;
use crate::session::identity::{Identity, Role};
// async_trait required for dyn-compatibility with Box<dyn SessionProvider>
use async_trait::async_trait;

/// Source of the current caller's identity
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Id of the user making the call
    async fn current_user_id(&self) -> Result<UserId, SessionError>;

    /// Role of the user making the call
    async fn current_user_role(&self) -> Result<Role, SessionError>;

    /// Both halves of the identity
    async fn identity(&self) -> Result<Identity, SessionError> {
        Ok(Identity {
            user_id: self.current_user_id().await?,
            role: self.current_user_role().await?,
        })
    }

    /// Get a description of the session source (for logging)
    fn source(&self) -> &'static str;
}

/// Box type alias for session providers
pub type BoxedSessionProvider = Box<dyn SessionProvider>;
