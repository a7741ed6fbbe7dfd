//! Request logging with failed/slow sampling.
//!
//! The observer wraps the whole request lifecycle: it stamps a request id,
//! times the handler, classifies the outcome and, for noteworthy requests
//! only, composes a redacted record and hands it to the log sink off the
//! response path. A request is noteworthy when it failed (status ≥ 400) or
//! ran slower than the configured threshold; everything else produces no
//! record at all, which bounds log volume under normal load.
//!
//! Record composition and dispatch are fully contained: a serialization
//! problem or a failing sink is at most a debug line, never a failed
//! request.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use atelier_core::redact::redact;
use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tower::{Layer, Service};
use uuid::Uuid;

use crate::config::WebConfig;
use crate::error::ErrorDetail;
use crate::sink::LogSink;

/// Header carrying the caller-assigned request id; echoed on every
/// response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id for the current request, stored in request extensions by the
/// observer.
#[derive(Debug, Clone)]
pub struct RequestId(pub Arc<str>);

impl RequestId {
    /// Get as string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One structured log record, serialized to a single compact JSON line.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogRecord {
    request_id: String,
    timestamp: String,
    method: String,
    url: String,
    status_code: u16,
    /// Milliseconds from request entry to response completion.
    duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_body: Option<Value>,
}

/// Create the observability layer.
#[must_use]
pub fn observability_layer<L: LogSink>(sink: L, config: Arc<WebConfig>) -> ObservabilityLayer<L> {
    ObservabilityLayer { sink, config }
}

/// Tower layer installing [`Observer`].
#[derive(Clone, Debug)]
pub struct ObservabilityLayer<L> {
    sink: L,
    config: Arc<WebConfig>,
}

impl<S, L: LogSink> Layer<S> for ObservabilityLayer<L> {
    type Service = Observer<S, L>;

    fn layer(&self, inner: S) -> Self::Service {
        Observer {
            inner,
            sink: self.sink.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

/// Middleware service timing requests and emitting sampled log records.
#[derive(Clone, Debug)]
pub struct Observer<S, L> {
    inner: S,
    sink: L,
    config: Arc<WebConfig>,
}

impl<S, L> Service<Request> for Observer<S, L>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    L: LogSink,
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
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let sink = self.sink.clone();
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let started = Instant::now();
            let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

            let (mut parts, body) = req.into_parts();

            let request_id: Arc<str> = match parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                Some(id) if !id.is_empty() => Arc::from(id),
                _ => Arc::from(Uuid::new_v4().to_string()),
            };

            let method = parts.method.to_string();
            let url = parts.uri.path().to_string();
            let query = parts.uri.query().and_then(parse_query);
            let params = path_params(&mut parts).await;
            let user_agent = parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string);

            let (body, request_bytes) = if is_json(&parts.headers) {
                buffer_if_small(body, config.max_captured_body_bytes).await
            } else {
                (body, None)
            };

            parts.extensions.insert(RequestId(Arc::clone(&request_id)));
            let req = Request::from_parts(parts, body);

            let mut response = inner.call(req).await?;

            let elapsed = started.elapsed();
            let status = response.status();
            let failed = status.is_client_error() || status.is_server_error();
            let slow = elapsed > config.slow_request_threshold;

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            metrics::counter!(
                "http.requests",
                "method" => method.clone(),
                "status" => status.as_u16().to_string()
            )
            .increment(1);
            metrics::histogram!("http.request_duration_ms").record(elapsed.as_millis() as f64);

            if !(failed || slow) {
                return Ok(response);
            }

            let error = response.extensions().get::<ErrorDetail>().cloned();

            let (response, response_body) = if failed {
                let (parts, body) = response.into_parts();
                let (body, bytes) = buffer_if_small(body, config.max_captured_body_bytes).await;
                (Response::from_parts(parts, body), bytes.and_then(parse_body))
            } else {
                (response, None)
            };

            let record = LogRecord {
                request_id: request_id.to_string(),
                timestamp,
                method,
                url,
                status_code: status.as_u16(),
                duration: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                query: query.as_ref().map(redact),
                params: params.as_ref().map(redact),
                request_body: if failed {
                    request_bytes
                        .and_then(parse_body)
                        .as_ref()
                        .map(redact)
                } else {
                    None
                },
                user_agent: if failed { user_agent } else { None },
                error,
                response_body: response_body.as_ref().map(redact),
            };

            dispatch(sink, &record);
            Ok(response)
        })
    }
}

/// Hand the record to the sink off the response path.
fn dispatch<L: LogSink>(sink: L, record: &LogRecord) {
    match serde_json::to_string(record) {
        Ok(line) => {
            tokio::spawn(async move {
                if let Err(err) = sink.send(line).await {
                    tracing::debug!(error = %err, "log record dropped");
                }
            });
        }
        Err(err) => tracing::debug!(error = %err, "log record serialization failed"),
    }
}

/// Query string as a JSON object; `None` when empty or unparseable.
fn parse_query(query: &str) -> Option<Value> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    if pairs.is_empty() {
        return None;
    }
    let map: serde_json::Map<String, Value> = pairs
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    Some(Value::Object(map))
}

/// Route parameters as a JSON object; `None` when the observer runs
/// outside a routed stack or the route has none.
async fn path_params(parts: &mut Parts) -> Option<Value> {
    let raw = RawPathParams::from_request_parts(parts, &()).await.ok()?;
    let map: serde_json::Map<String, Value> = raw
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect();
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

/// Buffer a body whose exact size is known and within `cap`, handing back
/// an equivalent body plus the bytes; larger or streaming bodies pass
/// through untouched.
async fn buffer_if_small(body: Body, cap: usize) -> (Body, Option<Bytes>) {
    let exact = HttpBody::size_hint(&body)
        .exact()
        .and_then(|size| usize::try_from(size).ok());
    if !exact.is_some_and(|size| size <= cap) {
        return (body, None);
    }
    match axum::body::to_bytes(body, cap).await {
        Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
        Err(_) => (Body::empty(), None),
    }
}

/// Interpret captured bytes as JSON, falling back to a string scalar.
fn parse_body(bytes: Bytes) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_slice(&bytes) {
        return Some(value);
    }
    std::str::from_utf8(&bytes)
        .ok()
        .map(|text| Value::String(text.to_string()))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::sink::{CapturingSink, SinkError};
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use std::time::Duration;
    use tower::ServiceExt;

    fn fast_config() -> Arc<WebConfig> {
        Arc::new(WebConfig::development())
    }

    /// Let the spawned dispatch task run.
    async fn drain() {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    fn observed(router: Router, sink: CapturingSink, config: Arc<WebConfig>) -> Router {
        router.layer(observability_layer(sink, config))
    }

    #[tokio::test]
    async fn fast_success_emits_nothing() {
        let sink = CapturingSink::new();
        let app = observed(
            Router::new().route("/ok", get(|| async { "ok" })),
            sink.clone(),
            fast_config(),
        );

        let response = app
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        drain().await;
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn failure_emits_exactly_one_record() {
        let sink = CapturingSink::new();
        let app = observed(
            Router::new().route("/boom", get(|| async { ApiError::internal() })),
            sink.clone(),
            fast_config(),
        );

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        drain().await;
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn slow_success_emits_exactly_one_record() {
        let sink = CapturingSink::new();
        let config = Arc::new(WebConfig {
            slow_request_threshold: Duration::from_millis(20),
            ..WebConfig::development()
        });
        let app = observed(
            Router::new().route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(60)).await;
                    "done"
                }),
            ),
            sink.clone(),
            config,
        );

        let response = app
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        drain().await;
        assert_eq!(sink.len(), 1);

        let record: Value = serde_json::from_str(&sink.records()[0]).unwrap();
        assert_eq!(record["statusCode"], 200);
        assert!(record["duration"].as_u64().unwrap() >= 20);
        // Success paths never carry bodies or user agent.
        assert!(record.get("requestBody").is_none());
        assert!(record.get("userAgent").is_none());
        assert!(record.get("responseBody").is_none());
    }

    #[tokio::test]
    async fn failed_record_carries_redacted_sections() {
        let sink = CapturingSink::new();
        let app = observed(
            Router::new().route("/login", post(|| async { ApiError::unauthenticated() })),
            sink.clone(),
            fast_config(),
        );

        let response = app
            .oneshot(
                Request::post("/login?redirect=home&token=abc123")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::USER_AGENT, "Mozilla/5.0 (Test)")
                    .body(Body::from(r#"{"email":"ada@example.com","password":"hunter2"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        drain().await;
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].contains('\n'));
        assert!(!records[0].contains("hunter2"));
        assert!(!records[0].contains("abc123"));

        let record: Value = serde_json::from_str(&records[0]).unwrap();
        assert_eq!(record["method"], "POST");
        assert_eq!(record["url"], "/login");
        assert_eq!(record["statusCode"], 401);
        assert_eq!(record["query"]["redirect"], "home");
        assert_eq!(record["query"]["token"], "[REDACTED]");
        assert_eq!(record["requestBody"]["email"], "ada@example.com");
        assert_eq!(record["requestBody"]["password"], "[REDACTED]");
        assert_eq!(record["userAgent"], "Mozilla/5.0 (Test)");
        assert_eq!(record["error"]["name"], "Unauthenticated");
        assert_eq!(record["error"]["code"], 40100);
        assert_eq!(record["responseBody"]["code"], 40100);
    }

    #[tokio::test]
    async fn route_params_are_captured_inside_the_routed_stack() {
        let sink = CapturingSink::new();
        let app = Router::new()
            .route("/projects/:id", get(|| async { ApiError::not_found("Project", "7") }))
            .route_layer(observability_layer(sink.clone(), fast_config()));

        let response = app
            .oneshot(Request::get("/projects/7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        drain().await;
        let record: Value = serde_json::from_str(&sink.records()[0]).unwrap();
        assert_eq!(record["params"]["id"], "7");
    }

    #[tokio::test]
    async fn request_id_is_taken_from_header_and_echoed() {
        let sink = CapturingSink::new();
        let app = observed(
            Router::new().route("/boom", get(|| async { ApiError::internal() })),
            sink.clone(),
            fast_config(),
        );

        let response = app
            .oneshot(
                Request::get("/boom")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            "req-42"
        );

        drain().await;
        let record: Value = serde_json::from_str(&sink.records()[0]).unwrap();
        assert_eq!(record["requestId"], "req-42");
    }

    #[tokio::test]
    async fn request_id_is_generated_when_absent() {
        let sink = CapturingSink::new();
        let app = observed(
            Router::new().route("/ok", get(|| async { "ok" })),
            sink.clone(),
            fast_config(),
        );

        let response = app
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let echoed = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        assert!(Uuid::parse_str(echoed).is_ok());
    }

    #[derive(Debug, Clone, Copy)]
    struct FailingSink;

    impl LogSink for FailingSink {
        async fn send(&self, _record: String) -> Result<(), SinkError> {
            Err(SinkError::Transport("collector unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn sink_failure_never_fails_the_request() {
        let app = Router::new()
            .route("/boom", get(|| async { ApiError::internal() }))
            .layer(observability_layer(FailingSink, fast_config()));

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        drain().await;
    }

    #[tokio::test]
    async fn oversized_bodies_stream_through_uncaptured() {
        let sink = CapturingSink::new();
        let config = Arc::new(WebConfig {
            max_captured_body_bytes: 16,
            ..WebConfig::development()
        });
        let big = r#"{"password":"0123456789abcdef0123456789abcdef"}"#;
        let app = observed(
            Router::new().route(
                "/boom",
                post(|body: String| async move {
                    assert!(!body.is_empty());
                    ApiError::internal()
                }),
            ),
            sink.clone(),
            config,
        );

        let response = app
            .oneshot(
                Request::post("/boom")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(big))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        drain().await;
        let record: Value = serde_json::from_str(&sink.records()[0]).unwrap();
        assert!(record.get("requestBody").is_none());
    }
}
