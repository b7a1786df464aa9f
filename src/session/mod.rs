//! Session identity
//!
//! The workflow never reads ambient session state. Every gateway call takes an
//! explicit [`Identity`]; this module provides the injectable sources that
//! produce one: a fixed identity for the stdio transport and request headers
//! for the HTTP transport.

pub mod fixed;
pub mod headers;
pub mod identity;
pub mod provider;

pub use fixed::FixedSession;
pub use headers::HeaderSession;
pub use identity::{IdValidator, Identity, Role};
pub use provider::{BoxedSessionProvider, SessionProvider};

use crate::config::SessionConfig;
use crate::error::SessionError;

/// Create the session provider for the stdio transport from configuration
pub fn create_session_provider(
    config: &SessionConfig,
    ids: &IdValidator,
) -> Result<BoxedSessionProvider, SessionError> {
    match (&config.user_id, &config.role) {
        (Some(user_id), role) => Ok(Box::new(FixedSession::parse(
            user_id,
            role.as_deref().unwrap_or("reader"),
            ids,
        )?)),
        // Try environment variables
        (None, _) => Ok(Box::new(FixedSession::from_env(ids)?)),
    }
}
