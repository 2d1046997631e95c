//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. Every violation is returned, not just the first.

use std::collections::HashSet;

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }
    if config.listener.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.shutdown_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    let db = &config.database;
    if let Err(e) = url::Url::parse(&db.url) {
        errors.push(ValidationError::new("database.url", format!("invalid URL: {}", e)));
    }
    if db.max_open_conns == 0 {
        errors.push(ValidationError::new("database.max_open_conns", "must be greater than zero"));
    }
    if db.max_idle_conns > db.max_open_conns {
        errors.push(ValidationError::new(
            "database.max_idle_conns",
            format!("must not exceed max_open_conns ({})", db.max_open_conns),
        ));
    }

    for (i, origin) in config.cors.allowed_origins.iter().enumerate() {
        if origin.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("cors.allowed_origins[{}]", i),
                "must not be empty",
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, token) in config.auth.tokens.iter().enumerate() {
        if token.token.is_empty() {
            errors.push(ValidationError::new(format!("auth.tokens[{}].token", i), "must not be empty"));
        }
        if !seen.insert((token.audience.as_str(), token.token.as_str())) {
            errors.push(ValidationError::new(
                format!("auth.tokens[{}]", i),
                format!("duplicate token for audience {}", token.audience),
            ));
        }
    }

    if config.observability.metrics_max_age_secs == 0 {
        errors.push(ValidationError::new(
            "observability.metrics_max_age_secs",
            "must be greater than zero",
        ));
    }

    if !(0.0..=1.0).contains(&config.sentry.sample_rate) {
        errors.push(ValidationError::new("sentry.sample_rate", "must be between 0.0 and 1.0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
