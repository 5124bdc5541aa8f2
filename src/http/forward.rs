//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Clone the inbound request (method, absolute URL, headers, streaming body)
//! - Execute it against the origin named by the URL
//! - Stream status, headers and body back to the client
//!
//! # Design Decisions
//! - One round trip per request: no retries, no connection reuse
//! - Bodies are streamed in both directions, never buffered
//! - Header relay goes through the configured `HeaderPolicy`

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{request::Parts, Request},
    response::Response,
    Router,
};
use futures_util::Stream;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::{error_chain, ProxyError};
use crate::http::headers::HeaderPolicy;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Shared, immutable state of the forward handler.
#[derive(Clone)]
pub struct ForwardState {
    pub client: Client<HttpConnector, Body>,
    pub headers: Arc<HeaderPolicy>,
    pub request_timeout: Option<Duration>,
}

impl ForwardState {
    pub fn new(config: &ProxyConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(config.timeouts.connect());

        // pool_max_idle_per_host(0): every request dials its own connection
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self {
            client,
            headers: Arc::new(HeaderPolicy::from_config(&config.headers)),
            request_timeout: config.timeouts.request(),
        }
    }
}

/// Router serving every non-CONNECT request through the forward handler.
pub fn router(state: ForwardState) -> Router {
    Router::new()
        .fallback(forward_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Build the outbound request from the inbound one.
///
/// The target must be an absolute `http://` URL: that is what a client
/// sends to a forward proxy, and it is the only place the origin is named.
pub fn build_outbound(
    parts: &Parts,
    body: Body,
    policy: &HeaderPolicy,
) -> Result<Request<Body>, ProxyError> {
    let uri = &parts.uri;

    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => {
            return Err(ProxyError::RequestConstruction(format!(
                "unsupported protocol scheme \"{}\"",
                other
            )));
        }
        None => {
            return Err(ProxyError::RequestConstruction(format!(
                "'{}' is not an absolute URL",
                uri
            )));
        }
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(ProxyError::RequestConstruction(format!(
            "no host in request URL '{}'",
            uri
        )));
    }

    let mut outbound = Request::builder()
        .method(parts.method.clone())
        .uri(uri.clone())
        .body(body)
        .map_err(|e| ProxyError::RequestConstruction(e.to_string()))?;

    policy.copy(&parts.headers, outbound.headers_mut());
    Ok(outbound)
}

/// Forward a non-CONNECT request and relay the origin's response.
pub async fn forward_handler(
    State(state): State<ForwardState>,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    tracing::info!(method = %parts.method, uri = %parts.uri, "Got request");

    let outbound = build_outbound(&parts, body, &state.headers)?;

    let upstream = with_deadline(state.request_timeout, state.client.request(outbound))
        .await
        .map_err(|elapsed| ProxyError::UpstreamRequest(elapsed.to_string()))?
        .map_err(|e| ProxyError::UpstreamRequest(error_chain(&e)))?;

    let (upstream_parts, upstream_body) = upstream.into_parts();

    tracing::info!(
        uri = %parts.uri,
        status = %upstream_parts.status,
        "Copying resp to client"
    );
    metrics::record_request(parts.method.as_str(), upstream_parts.status.as_u16(), start);

    let body = CountedBody::new(
        Body::new(upstream_body).into_data_stream(),
        parts.uri.to_string(),
    );
    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = upstream_parts.status;
    state
        .headers
        .copy(&upstream_parts.headers, response.headers_mut());

    Ok(response)
}

/// Response body stream that reports how much was relayed once it is
/// dropped, whether it ran to completion, failed, or the client went away.
struct CountedBody<S> {
    inner: S,
    uri: String,
    copied: u64,
    finished: bool,
    error: Option<String>,
}

impl<S> CountedBody<S> {
    fn new(inner: S, uri: String) -> Self {
        Self {
            inner,
            uri,
            copied: 0,
            finished: false,
            error: None,
        }
    }
}

impl<S> Stream for CountedBody<S>
where
    S: Stream<Item = Result<Bytes, axum::Error>> + Unpin,
{
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_next(cx);
        match &poll {
            Poll::Ready(Some(Ok(chunk))) => this.copied += chunk.len() as u64,
            Poll::Ready(Some(Err(e))) => this.error = Some(e.to_string()),
            Poll::Ready(None) => this.finished = true,
            Poll::Pending => {}
        }
        poll
    }
}

impl<S> Drop for CountedBody<S> {
    fn drop(&mut self) {
        tracing::info!(
            uri = %self.uri,
            bytes = self.copied,
            complete = self.finished,
            error = ?self.error,
            "Copied bytes to client"
        );
    }
}
