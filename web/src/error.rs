//! Global error dispatcher.
//!
//! [`ApiError`] is the only error type handlers return, and its
//! `IntoResponse` impl is the only place a failure body is shaped. The
//! wire envelope is always `{"data": null, "code": <int>, "message":
//! "<string>"}` with the HTTP status derived from the code's leading three
//! digits, whether the failure came from validation, the CSRF guard, an
//! upstream dependency or a defect.
//!
//! Opaque errors (an `anyhow::Error`, a panicking handler) are logged with
//! full detail server-side and reach the caller only as the generic
//! internal-error envelope.

use std::fmt;

use atelier_core::taxonomy::{self, codes, Code};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// First-class taxonomy error.
///
/// Carries a stable code plus an optional message override and an opaque
/// source retained for server-side logging only.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Project>, ApiError> {
///     let project = find_project(id).await
///         .ok_or_else(|| ApiError::not_found("Project", id))?;
///     Ok(Json(project))
/// }
/// ```
#[derive(Debug)]
pub struct ApiError {
    code: Code,
    message: Option<String>,
    source: Option<anyhow::Error>,
}

impl ApiError {
    /// Create an error for a registered code.
    #[must_use]
    pub const fn new(code: Code) -> Self {
        Self {
            code,
            message: None,
            source: None,
        }
    }

    /// Override the registered message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach an opaque source, logged server-side and never sent.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Validation failure with a caller-facing reason.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION_FAILED).with_message(message)
    }

    /// Missing or invalid credentials.
    #[must_use]
    pub const fn unauthenticated() -> Self {
        Self::new(codes::UNAUTHENTICATED)
    }

    /// Authenticated but not allowed.
    #[must_use]
    pub const fn forbidden() -> Self {
        Self::new(codes::FORBIDDEN)
    }

    /// CSRF token missing or mismatched.
    #[must_use]
    pub const fn csrf_rejected() -> Self {
        Self::new(codes::CSRF_REJECTED)
    }

    /// Resource lookup miss.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(codes::NOT_FOUND).with_message(format!("{resource} with id {id} not found"))
    }

    /// State conflict with an existing resource.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(codes::CONFLICT).with_message(message)
    }

    /// An upstream dependency failed.
    #[must_use]
    pub const fn upstream() -> Self {
        Self::new(codes::UPSTREAM_FAILED)
    }

    /// Unclassified server failure; the caller sees only the generic
    /// message.
    #[must_use]
    pub const fn internal() -> Self {
        Self::new(codes::INTERNAL)
    }

    /// Service temporarily unavailable.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self::new(codes::UNAVAILABLE)
    }

    /// The wire code.
    #[must_use]
    pub const fn code(&self) -> Code {
        self.code
    }

    /// The caller-facing message: the override if set, else the message
    /// registered for the code.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| taxonomy::message_for(self.code))
    }

    /// The HTTP status derived from the code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(taxonomy::status_for(self.code))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message())
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Opaque errors become the generic internal envelope.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal().with_source(err)
    }
}

/// Structured error detail attached to failed responses for the observer's
/// log record. Never serialized into the caller-facing body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// Category name derived from the code.
    pub name: String,
    /// Caller-facing message.
    pub message: String,
    /// Source chain for opaque errors, server-side only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Originating taxonomy code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Code>,
    /// HTTP status the code resolved to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Wire envelope for every failure path.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    /// Always null on failures.
    data: Option<()>,
    /// Taxonomy code.
    code: Code,
    /// Caller-facing message.
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message().to_string();

        if status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    code = self.code,
                    message = %message,
                    error = ?source,
                    "request failed with server error"
                ),
                None => tracing::error!(
                    code = self.code,
                    message = %message,
                    "request failed with server error"
                ),
            }
        }

        let detail = ErrorDetail {
            name: taxonomy::name_for(self.code).to_string(),
            message: message.clone(),
            stack: self.source.as_ref().map(|source| format!("{source:?}")),
            code: Some(self.code),
            status: Some(status.as_u16()),
        };

        let body = ErrorEnvelope {
            data: None,
            code: self.code,
            message,
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(detail);
        response
    }
}

/// Terminal handler for panicking request handlers, wired through
/// `tower_http::catch_panic` by [`crate::AppContext::apply`].
///
/// The panic payload is logged server-side; the caller receives the
/// generic internal-error envelope.
#[must_use]
pub fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = err
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "opaque panic payload".to_string());

    tracing::error!(panic = %message, "request handler panicked");

    ApiError::internal()
        .with_source(anyhow::anyhow!(message))
        .into_response()
}
