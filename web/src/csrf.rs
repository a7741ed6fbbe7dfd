//! Double-submit cookie CSRF guard.
//!
//! Browser clients hold an opaque token in a script-readable cookie and
//! echo it in a header on every state-changing request. Cross-origin
//! script cannot read the cookie, so a matching pair proves same-origin
//! provenance. Bearer-token clients declare themselves with
//! `x-client-type: mobile` and skip the guard entirely — they carry no
//! cookies and have no CSRF exposure.
//!
//! The guard never shapes a response body itself: a rejection is an
//! [`ApiError`] rendered by the global dispatcher. Its only side effect is
//! at most one `Set-Cookie` per request, issued whenever the token cookie
//! is absent (on safe requests too, so a client can bootstrap a token
//! before its first mutation).

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use rand::RngCore;
use tower::{Layer, Service};

use crate::config::{Environment, WebConfig};
use crate::error::ApiError;

/// Cookie holding the CSRF token.
pub const CSRF_COOKIE: &str = "csrf-token";

/// Header echoing the token on non-safe requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Header declaring the client type.
pub const CLIENT_TYPE_HEADER: &str = "x-client-type";

/// Client type exempt from the guard.
const EXEMPT_CLIENT_TYPE: &str = "mobile";

const TOKEN_BYTES: usize = 32;

/// Create the CSRF guard layer.
#[must_use]
pub fn csrf_layer(config: Arc<WebConfig>) -> CsrfLayer {
    CsrfLayer { config }
}

/// Tower layer installing [`CsrfGuard`].
#[derive(Clone, Debug)]
pub struct CsrfLayer {
    config: Arc<WebConfig>,
}

impl<S> Layer<S> for CsrfLayer {
    type Service = CsrfGuard<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfGuard {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Middleware service enforcing the double-submit check.
#[derive(Clone, Debug)]
pub struct CsrfGuard<S> {
    inner: S,
    config: Arc<WebConfig>,
}

impl<S> Service<Request> for CsrfGuard<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Bearer-token clients have nothing to defend.
        if client_is_exempt(req.headers()) {
            return Box::pin(self.inner.call(req));
        }

        let cookie_token = cookie_value(req.headers(), CSRF_COOKIE);
        let issued = if cookie_token.is_none() {
            build_cookie(&generate_token(), self.config.environment)
        } else {
            None
        };

        let verdict = if is_safe_method(req.method()) {
            Ok(())
        } else {
            validate(cookie_token.as_deref(), header_token(req.headers()))
        };

        match verdict {
            Ok(()) => {
                let fut = self.inner.call(req);
                Box::pin(async move {
                    let mut response = fut.await?;
                    attach_cookie(&mut response, issued);
                    Ok(response)
                })
            }
            Err(err) => Box::pin(async move {
                let mut response = err.into_response();
                // The bootstrap cookie still ships so the client can retry.
                attach_cookie(&mut response, issued);
                Ok(response)
            }),
        }
    }
}

fn client_is_exempt(headers: &HeaderMap) -> bool {
    headers
        .get(CLIENT_TYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case(EXEMPT_CLIENT_TYPE))
}

/// Read-only methods bypass validation; everything else must prove itself.
fn is_safe_method(method: &Method) -> bool {
    *method == Method::GET
        || *method == Method::HEAD
        || *method == Method::OPTIONS
        || *method == Method::TRACE
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(CSRF_HEADER).and_then(|value| value.to_str().ok())
}

/// Extract a cookie value from the `Cookie` request header(s).
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|raw| raw.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

fn validate(cookie: Option<&str>, header: Option<&str>) -> Result<(), ApiError> {
    match (cookie, header) {
        (Some(cookie), Some(header))
            if constant_time_eq::constant_time_eq(cookie.as_bytes(), header.as_bytes()) =>
        {
            Ok(())
        }
        _ => Err(ApiError::csrf_rejected()),
    }
}

/// 256-bit token encoded as base64url without padding.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// The cookie stays script-readable (no `HttpOnly`): client code must read
/// it to echo it back in the header.
fn build_cookie(token: &str, environment: Environment) -> Option<HeaderValue> {
    let cookie = if environment.is_production() {
        format!("{CSRF_COOKIE}={token}; Path=/; SameSite=Strict; Secure")
    } else {
        format!("{CSRF_COOKIE}={token}; Path=/; SameSite=Lax")
    };
    HeaderValue::from_str(&cookie).ok()
}

fn attach_cookie(response: &mut Response, cookie: Option<HeaderValue>) {
    if let Some(cookie) = cookie {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
}
