//! Axum request-safety and observability layer for atelier services.
//!
//! Every endpoint of an atelier backend shares the same cross-cutting
//! stack, installed once on the application router:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  CSRF guard                             │  ← double-submit cookie check
//! ├─────────────────────────────────────────┤
//! │  Observer                               │  ← timing, sampling, redaction
//! ├─────────────────────────────────────────┤
//! │  Panic capture                          │  ← defects → generic envelope
//! ├─────────────────────────────────────────┤
//! │  Routed handlers (application)          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Failures anywhere in the stack funnel into [`ApiError`], whose
//! `IntoResponse` impl is the single place a wire error body is shaped:
//! `{"data": null, "code": <int>, "message": "<string>"}`.
//!
//! # Example
//!
//! ```ignore
//! use atelier_web::{AppContext, TracingSink, WebConfig};
//! use axum::{routing::get, Router};
//!
//! let ctx = AppContext::new(WebConfig::from_env(), TracingSink);
//! let app = ctx.apply(Router::new().route("/health", get(atelier_web::handlers::health_check)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod csrf;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod observability;
pub mod sink;
pub mod state;

// Re-export key types for convenience
pub use config::{Environment, WebConfig};
pub use csrf::{csrf_layer, CLIENT_TYPE_HEADER, CSRF_COOKIE, CSRF_HEADER};
pub use error::{handle_panic, ApiError, ErrorDetail};
pub use extractors::UserAgent;
pub use observability::{observability_layer, RequestId, REQUEST_ID_HEADER};
pub use sink::{LogSink, SinkError, TracingSink};
pub use state::AppContext;

#[cfg(any(test, feature = "test-utils"))]
pub use sink::CapturingSink;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, ApiError>;
