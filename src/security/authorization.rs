//! Authorization capability.
//!
//! # Responsibilities
//! - Validate bearer tokens for an audience and produce [`Claims`]
//! - Answer permission checks by claims, action and object identifiers
//!
//! # Design Decisions
//! - Policy engines plug in behind the [`Authorization`] trait
//! - [`StaticTokenAuth`] is a config-driven adapter with a fixed token table

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use thiserror::Error;

use crate::config::AuthConfig;

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub audience: String,
}

/// Operation a subject wants to perform on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl FromStr for Action {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Action::Read),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(AuthError::UnknownAction(other.to_string())),
        }
    }
}

/// Errors returned by authorization adapters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("not authorized")]
    NotAuthorized,

    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Token validation and permission checks.
pub trait Authorization: Send + Sync {
    /// Validate `token` for `audience`.
    fn validate(&self, audience: &str, token: &str) -> Result<Claims, AuthError>;

    /// Check whether `claims` may perform `action` on the object identified
    /// by `objects` (e.g. `["rooms", "42"]`).
    fn check(&self, claims: &Claims, action: Action, objects: &[&str]) -> Result<(), AuthError>;
}

#[derive(Debug, Clone)]
enum Grant {
    All,
    Actions(HashSet<Action>),
}

#[derive(Debug, Clone)]
struct TokenEntry {
    subject: String,
}

/// Bearer tokens loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    /// (audience, token) → subject
    tokens: HashMap<(String, String), TokenEntry>,
    /// (audience, subject) → granted actions
    grants: HashMap<(String, String), Grant>,
}

impl StaticTokenAuth {
    /// Build the token table. Unknown action names are skipped with a warning.
    pub fn from_config(config: &AuthConfig) -> Self {
        let mut auth = Self::default();

        for entry in &config.tokens {
            auth.tokens.insert(
                (entry.audience.clone(), entry.token.clone()),
                TokenEntry {
                    subject: entry.subject.clone(),
                },
            );

            let grant = if entry.actions.iter().any(|a| a == "*") {
                Grant::All
            } else {
                let actions = entry
                    .actions
                    .iter()
                    .filter_map(|a| match a.parse::<Action>() {
                        Ok(action) => Some(action),
                        Err(e) => {
                            tracing::warn!(audience = %entry.audience, error = %e, "Ignoring action");
                            None
                        }
                    })
                    .collect();
                Grant::Actions(actions)
            };
            auth.grants
                .insert((entry.audience.clone(), entry.subject.clone()), grant);
        }

        auth
    }
}

impl Authorization for StaticTokenAuth {
    fn validate(&self, audience: &str, token: &str) -> Result<Claims, AuthError> {
        self.tokens
            .get(&(audience.to_string(), token.to_string()))
            .map(|entry| Claims {
                subject: entry.subject.clone(),
                audience: audience.to_string(),
            })
            .ok_or(AuthError::InvalidToken)
    }

    fn check(&self, claims: &Claims, action: Action, objects: &[&str]) -> Result<(), AuthError> {
        let granted = match self
            .grants
            .get(&(claims.audience.clone(), claims.subject.clone()))
        {
            Some(Grant::All) => true,
            Some(Grant::Actions(actions)) => actions.contains(&action),
            None => false,
        };

        if granted {
            Ok(())
        } else {
            tracing::debug!(
                subject = %claims.subject,
                audience = %claims.audience,
                action = ?action,
                object = %objects.join("/"),
                "Permission denied"
            );
            Err(AuthError::NotAuthorized)
        }
    }
}
