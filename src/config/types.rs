//! Configuration types for bookgate
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::notifications::templates::{DEFAULT_APPROVAL_TEMPLATE, DEFAULT_REJECTION_TEMPLATE};
use serde::Deserialize;

/// Default pattern for user and book identifiers
pub const DEFAULT_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.:@-]{0,127}$";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server/transport settings
    pub server: ServerConfig,

    /// Access-request workflow policy
    pub workflow: WorkflowConfig,

    /// Notification feed settings
    pub notifications: NotificationConfig,

    /// Session identity settings
    pub session: SessionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server/transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport mode
    pub transport: TransportMode,

    /// HTTP host (for http transport)
    pub host: String,

    /// HTTP port (for http transport)
    pub port: u16,

    /// Server name reported by `/health`
    pub name: String,

    /// Server version reported by `/health`
    pub version: String,

    /// CORS policy for the HTTP transport
    pub cors: CorsMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportMode::Http,
            host: "127.0.0.1".to_string(),
            port: 8080,
            name: "bookgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cors: CorsMode::default(),
        }
    }
}

/// Transport mode selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Line-delimited JSON commands on standard input/output
    Stdio,
    /// REST over HTTP (default)
    #[default]
    Http,
}

/// CORS handling for the HTTP transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorsMode {
    /// No CORS headers (same-origin clients only)
    #[default]
    Disabled,
    /// Allow any origin, for browser front ends served elsewhere
    Permissive,
}

/// What to do when a reader submits a second request while one is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with a duplicate-request error
    #[default]
    Reject,
    /// Return the existing pending request unchanged
    Fold,
}

/// Access-request workflow policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Handling of a second submission for a pair with a pending request
    pub duplicate_policy: DuplicatePolicy,

    /// Refuse requests for books the reader can already access
    pub reject_when_granted: bool,

    /// Maximum reason length in characters (0 disables the limit)
    pub max_reason_length: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            reject_when_granted: true,
            max_reason_length: 1000,
        }
    }
}

/// Notification feed configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Unread-count refresh interval for pollers, in seconds
    pub poll_interval_secs: u64,

    /// Events buffered per feed subscriber
    pub channel_capacity: usize,

    /// Message sent when a request is approved
    pub approval_template: String,

    /// Message sent when a request is rejected
    pub rejection_template: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            channel_capacity: 64,
            approval_template: DEFAULT_APPROVAL_TEMPLATE.to_string(),
            rejection_template: DEFAULT_REJECTION_TEMPLATE.to_string(),
        }
    }
}

/// Session identity configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Request header carrying the caller's user id (http transport)
    pub user_id_header: String,

    /// Request header carrying the caller's role (http transport)
    pub role_header: String,

    /// Fixed user id for the stdio transport (prefer env var BOOKGATE_USER_ID)
    pub user_id: Option<String>,

    /// Fixed role for the stdio transport (prefer env var BOOKGATE_USER_ROLE)
    pub role: Option<String>,

    /// Regex every user and book id must match
    pub id_pattern: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id_header: "x-user-id".to_string(),
            role_header: "x-user-role".to_string(),
            user_id: None,
            role: None,
            id_pattern: DEFAULT_ID_PATTERN.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
