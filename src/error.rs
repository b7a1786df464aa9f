//! Error types for bookgate
//!
//! This module defines the error hierarchy used throughout the application.
//! We use `thiserror` for library-style errors that are part of the API,
//! and convert to HTTP responses at the transport boundary (see [`http_mapper`]).

pub mod http_mapper;

use crate::model::{BookId, RequestStatus, UserId};
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Access workflow error: {0}")]
    Access(#[from] AccessError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Errors raised by the access-request workflow and the gateway in front of it.
///
/// Every variant is surfaced to the caller unchanged so that a UI can tell
/// "already resolved" apart from "missing reason".
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: &'static str, message: String },

    #[error("User '{user_id}' already has a pending request for book '{book_id}'")]
    DuplicateRequest {
        user_id: UserId,
        book_id: BookId,
        existing: String,
    },

    #[error("User '{user_id}' already has access to book '{book_id}'")]
    AlreadyGranted { user_id: UserId, book_id: BookId },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Request {id} is already {status}")]
    AlreadyResolved { id: String, status: RequestStatus },

    #[error("Forbidden: {action} requires the {required} role")]
    Forbidden {
        action: &'static str,
        required: &'static str,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AccessError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Validation { .. } => "VALIDATION_ERROR",
            AccessError::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            AccessError::AlreadyGranted { .. } => "ALREADY_GRANTED",
            AccessError::NotFound { .. } => "NOT_FOUND",
            AccessError::AlreadyResolved { .. } => "ALREADY_RESOLVED",
            AccessError::Forbidden { .. } => "FORBIDDEN",
            AccessError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// Persistence collaborator failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record conflict: {0}")]
    Conflict(String),
}

/// Identity source errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No session identity configured")]
    NotConfigured,

    #[error("Missing session header: {0}")]
    MissingHeader(String),

    #[error("Invalid user id '{0}'")]
    InvalidUserId(String),

    #[error("Unknown role '{0}'")]
    UnknownRole(String),
}

impl SessionError {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotConfigured | SessionError::MissingHeader(_) => "UNAUTHENTICATED",
            SessionError::InvalidUserId(_) | SessionError::UnknownRole(_) => "INVALID_IDENTITY",
        }
    }
}

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for workflow and gateway operations
pub type AccessResult<T> = std::result::Result<T, AccessError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
