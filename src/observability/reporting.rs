//! Error reporting to Sentry.
//!
//! Reporting is optional: without a DSN nothing is initialized, and a DSN
//! that fails to parse is logged and ignored so the service still starts.

use sentry::types::Dsn;
use sentry::{ClientInitGuard, ClientOptions};

use crate::config::SentryConfig;

/// Initialize the Sentry client. Keep the guard alive for the whole process;
/// dropping it flushes queued events.
pub fn init(config: &SentryConfig) -> Option<ClientInitGuard> {
    let dsn = config.dsn.as_deref().map(str::trim).filter(|d| !d.is_empty())?;

    let dsn: Dsn = match dsn.parse() {
        Ok(dsn) => dsn,
        Err(e) => {
            tracing::error!(error = %e, "Sentry initialization failed");
            return None;
        }
    };

    let guard = sentry::init(ClientOptions {
        dsn: Some(dsn),
        environment: config.environment.clone().map(Into::into),
        sample_rate: config.sample_rate,
        release: sentry::release_name!(),
        ..Default::default()
    });

    tracing::info!(environment = ?config.environment, "Sentry error reporting enabled");
    Some(guard)
}
