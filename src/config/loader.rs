//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (BOOKGATE__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "bookgate.toml",
    ".bookgate.toml",
    "~/.config/bookgate/config.toml",
    "/etc/bookgate/config.toml",
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with BOOKGATE prefix
    // e.g., BOOKGATE__SERVER__PORT, BOOKGATE__WORKFLOW__DUPLICATE_POLICY
    // Double underscore (__) maps to nested keys (server.port)
    builder = builder.add_source(
        Environment::with_prefix("BOOKGATE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    // 4. Session identity shorthands for the stdio transport
    for (env_var, key) in [
        ("BOOKGATE_USER_ID", "session.user_id"),
        ("BOOKGATE_USER_ROLE", "session.role"),
    ] {
        if let Ok(value) = std::env::var(env_var)
            && !value.is_empty()
        {
            builder = builder
                .set_override(key, value)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }
    }

    // Build and deserialize
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    // Validate port
    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    if config.server.host.is_empty() {
        return Err(ConfigError::Missing {
            field: "server.host".to_string(),
        });
    }

    // Refresh cadence below one second is not supported
    if config.notifications.poll_interval_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "notifications.poll_interval_secs must be at least 1".to_string(),
        });
    }

    if config.notifications.channel_capacity == 0 {
        return Err(ConfigError::Invalid {
            message: "notifications.channel_capacity must be greater than 0".to_string(),
        });
    }

    validate_template(&config.notifications.approval_template, "approval_template")?;
    validate_template(&config.notifications.rejection_template, "rejection_template")?;

    for (header, field) in [
        (&config.session.user_id_header, "session.user_id_header"),
        (&config.session.role_header, "session.role_header"),
    ] {
        if axum::http::HeaderName::try_from(header.as_str()).is_err() {
            return Err(ConfigError::Invalid {
                message: format!("{} is not a valid header name: {}", field, header),
            });
        }
    }

    validate_pattern(&config.session.id_pattern, "session.id_pattern")?;

    Ok(())
}

fn validate_template(template: &str, field: &str) -> Result<(), ConfigError> {
    if template.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: format!("notifications.{}", field),
        });
    }
    Ok(())
}

/// Validate that a pattern is a valid regex
fn validate_pattern(pattern: &str, field_path: &str) -> Result<(), ConfigError> {
    if let Err(e) = regex::Regex::new(pattern) {
        return Err(ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: format!("in {}: {}", field_path, e),
        });
    }
    Ok(())
}
