//! Application context and layer wiring.
//!
//! All shared dependencies of the web layer are constructed once at
//! process start and passed down through [`AppContext`]; there are no
//! module-level clients.

use std::sync::Arc;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::WebConfig;
use crate::csrf::csrf_layer;
use crate::error::handle_panic;
use crate::observability::observability_layer;
use crate::sink::LogSink;

/// Shared dependencies for the web layer.
///
/// # Examples
///
/// ```ignore
/// use atelier_web::{AppContext, TracingSink, WebConfig};
/// use axum::Router;
///
/// let ctx = AppContext::new(WebConfig::from_env(), TracingSink);
/// let app = ctx.apply(Router::new());
/// ```
#[derive(Clone, Debug)]
pub struct AppContext<L: LogSink> {
    /// Web-layer configuration.
    pub config: Arc<WebConfig>,
    /// Destination for request log records.
    pub sink: L,
}

impl<L: LogSink> AppContext<L> {
    /// Create a context from a configuration and a sink.
    #[must_use]
    pub fn new(config: WebConfig, sink: L) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    /// Install the request-safety stack on `router`.
    ///
    /// Layer order follows the request path: the CSRF guard runs first,
    /// then the observer starts timing, then the routed handler; a panic
    /// anywhere below the observer surfaces as the generic error envelope
    /// and is logged like any other failed request.
    #[must_use]
    pub fn apply(&self, router: Router) -> Router {
        router
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(observability_layer(self.sink.clone(), Arc::clone(&self.config)))
            .layer(csrf_layer(Arc::clone(&self.config)))
    }
}
