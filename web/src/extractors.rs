//! Custom Axum extractors.
//!
//! - [`RequestId`]: the id stamped by the observer, for handlers that want
//!   to correlate their own logs or responses
//! - [`UserAgent`]: the `User-Agent` header with a fallback
//!
//! # Examples
//!
//! ```ignore
//! use atelier_web::{RequestId, UserAgent};
//!
//! async fn handler(request_id: RequestId, user_agent: UserAgent) -> String {
//!     format!("{} from {}", request_id, user_agent.0)
//! }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::observability::{RequestId, REQUEST_ID_HEADER};

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The observer stamps the id; outside its stack, fall back to the
        // header or a fresh one.
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(id.clone());
        }

        let id: Arc<str> = match parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some(id) if !id.is_empty() => Arc::from(id),
            _ => Arc::from(Uuid::new_v4().to_string()),
        };

        Ok(Self(id))
    }
}

/// User-Agent header, or "Unknown" if not present.
#[derive(Debug, Clone)]
pub struct UserAgent(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("Unknown")
            .to_string();

        Ok(Self(user_agent))
    }
}
