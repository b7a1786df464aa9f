//! Header-based session identity
//!
//! The HTTP transport trusts an upstream proxy to authenticate the caller and
//! forward who they are in two headers.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::model::UserId;
use crate::session::identity::{IdValidator, Role};
use crate::session::provider::SessionProvider;
use async_trait::async_trait;
use axum::http::HeaderMap;

/// Identity carried by the headers of one HTTP request
#[derive(Debug, Clone)]
pub struct HeaderSession {
    user_id: Option<String>,
    role: Option<String>,
    user_id_header: String,
    role_header: String,
    ids: IdValidator,
}

impl HeaderSession {
    pub fn from_headers(headers: &HeaderMap, config: &SessionConfig, ids: &IdValidator) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            user_id: read(&config.user_id_header),
            role: read(&config.role_header),
            user_id_header: config.user_id_header.clone(),
            role_header: config.role_header.clone(),
            ids: ids.clone(),
        }
    }
}

#[async_trait]
impl SessionProvider for HeaderSession {
    async fn current_user_id(&self) -> Result<UserId, SessionError> {
        let raw = self
            .user_id
            .as_deref()
            .ok_or_else(|| SessionError::MissingHeader(self.user_id_header.clone()))?;
        self.ids.user_id(raw)
    }

    /// A missing role header means a reader
    async fn current_user_role(&self) -> Result<Role, SessionError> {
        match self.role.as_deref() {
            Some(raw) => raw.parse(),
            None => Ok(Role::Reader),
        }
    }

    fn source(&self) -> &'static str {
        "headers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Identity;
    use axum::http::HeaderValue;

    fn session(pairs: &[(&'static str, &'static str)]) -> HeaderSession {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        let config = SessionConfig::default();
        let ids = IdValidator::new(&config.id_pattern).unwrap();
        HeaderSession::from_headers(&headers, &config, &ids)
    }

    #[tokio::test]
    async fn test_identity_from_headers() {
        let s = session(&[("x-user-id", "lib1"), ("x-user-role", "LIBRARIAN")]);
        assert_eq!(s.identity().await.unwrap(), Identity::librarian("lib1"));
    }

    #[tokio::test]
    async fn test_missing_role_defaults_to_reader() {
        let s = session(&[("x-user-id", "u1")]);
        assert_eq!(s.identity().await.unwrap(), Identity::reader("u1"));
    }

    #[tokio::test]
    async fn test_missing_user_header() {
        let s = session(&[("x-user-role", "reader")]);
        assert_eq!(
            s.identity().await.unwrap_err(),
            SessionError::MissingHeader("x-user-id".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_role() {
        let s = session(&[("x-user-id", "u1"), ("x-user-role", "root")]);
        assert!(matches!(
            s.identity().await,
            Err(SessionError::UnknownRole(_))
        ));
    }
}
