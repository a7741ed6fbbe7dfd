//! Runtime configuration for the web layer.
//!
//! Built once at process start and passed down explicitly through
//! [`crate::AppContext`]; nothing here is read from a global after startup.

use std::env;
use std::time::Duration;

/// Deployment environment, driving cookie attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local or staging deployments.
    Development,
    /// Production-like deployments.
    Production,
}

impl Environment {
    /// Read from `APP_ENV`; `production`/`prod` selects
    /// [`Environment::Production`], anything else is development.
    #[must_use]
    pub fn from_env() -> Self {
        match env::var("APP_ENV") {
            Ok(value) if value == "production" || value == "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    /// Whether this is a production-like deployment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Web-layer configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Requests slower than this are logged even when they succeed.
    pub slow_request_threshold: Duration,
    /// Upper bound on request/response bytes buffered for log records.
    pub max_captured_body_bytes: usize,
}

impl WebConfig {
    const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_millis(1000);
    const MAX_CAPTURED_BODY_BYTES: usize = 64 * 1024;

    /// Configuration for the environment named by `APP_ENV`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::for_environment(Environment::from_env())
    }

    /// Development configuration.
    #[must_use]
    pub const fn development() -> Self {
        Self::for_environment(Environment::Development)
    }

    /// Production configuration.
    #[must_use]
    pub const fn production() -> Self {
        Self::for_environment(Environment::Production)
    }

    const fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            slow_request_threshold: Self::SLOW_REQUEST_THRESHOLD,
            max_captured_body_bytes: Self::MAX_CAPTURED_BODY_BYTES,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self::development()
    }
}
