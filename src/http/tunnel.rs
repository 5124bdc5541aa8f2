//! CONNECT tunnel handling.
//!
//! # Flow
//! ```text
//! Idle → Hijacking → Dialing → Tunneled → Closed
//!           │           │
//!           └───────────┴──→ error response (nothing hijacked yet)
//! ```
//!
//! The raw client connection is represented by hyper's `OnUpgrade` handle.
//! It is taken out of the request exactly once. The `200 OK` response is the
//! tunnel acknowledgment: hyper writes it, then resolves the handle with the
//! raw stream and no further HTTP is spoken on that connection.

use std::fmt;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Uri},
    response::{IntoResponse, Response},
};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::config::TimeoutConfig;
use crate::error::ProxyError;
use crate::http::relay::relay;
use crate::net::{ConnectionGuard, ConnectionId, ConnectionTracker};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Destination of a CONNECT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelTarget {
    host: String,
    port: u16,
}

impl TunnelTarget {
    /// Parse the `host:port` authority of a CONNECT request target.
    pub fn from_uri(uri: &Uri) -> Result<Self, ProxyError> {
        let authority = uri
            .authority()
            .ok_or_else(|| ProxyError::InvalidTarget(format!("no host in '{}'", uri)))?;

        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']');
        if host.is_empty() {
            return Err(ProxyError::InvalidTarget(format!("no host in '{}'", uri)));
        }

        let port = match authority.port_u16() {
            Some(0) | None => {
                return Err(ProxyError::InvalidTarget(format!("no port in '{}'", uri)));
            }
            Some(port) => port,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for TunnelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Handles CONNECT requests.
#[derive(Debug, Clone)]
pub struct TunnelHandler {
    connect_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    tracker: ConnectionTracker,
}

impl TunnelHandler {
    pub fn new(timeouts: &TimeoutConfig, tracker: ConnectionTracker) -> Self {
        Self {
            connect_timeout: timeouts.connect(),
            idle_timeout: timeouts.relay_idle(),
            tracker,
        }
    }

    pub async fn handle<B>(&self, request: Request<B>) -> Response {
        match self.establish(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "CONNECT rejected");
                e.into_response()
            }
        }
    }

    async fn establish<B>(&self, mut request: Request<B>) -> Result<Response, ProxyError> {
        let on_upgrade = request
            .extensions_mut()
            .remove::<OnUpgrade>()
            .ok_or(ProxyError::HijackUnsupported)?;

        let id = request
            .extensions()
            .get::<ConnectionId>()
            .copied()
            .unwrap_or_default();
        let target = TunnelTarget::from_uri(request.uri())?;

        tracing::info!(connection_id = %id, target = %target, "Accepting CONNECT");

        let upstream = self.dial(&target).await?;
        let guard = self.tracker.track_tunnel(id);
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            match on_upgrade.await {
                Ok(upgraded) => run_tunnel(TokioIo::new(upgraded), upstream, idle_timeout, guard, target).await,
                Err(e) => {
                    tracing::warn!(connection_id = %guard.id(), target = %target, error = %e, "Upgrade failed")
                }
            }
        });

        Ok(Response::new(Body::empty()))
    }

    async fn dial(&self, target: &TunnelTarget) -> Result<TcpStream, ProxyError> {
        with_deadline(
            self.connect_timeout,
            TcpStream::connect((target.host(), target.port())),
        )
        .await
        .map_err(|elapsed| ProxyError::UpstreamUnreachable(format!("dial tcp {}: {}", target, elapsed)))?
        .map_err(|e| ProxyError::UpstreamUnreachable(format!("dial tcp {}: {}", target, e)))
    }
}

async fn run_tunnel(
    client: TokioIo<hyper::upgrade::Upgraded>,
    upstream: TcpStream,
    idle_timeout: Option<Duration>,
    guard: ConnectionGuard,
    target: TunnelTarget,
) {
    let id = guard.id();
    metrics::tunnel_opened();

    let stats = relay(client, upstream, idle_timeout, id).await.stats;

    metrics::tunnel_closed(stats.client_to_upstream, stats.upstream_to_client);
    tracing::info!(
        connection_id = %id,
        target = %target,
        sent = stats.client_to_upstream,
        received = stats.upstream_to_client,
        "Complete communication"
    );
}
