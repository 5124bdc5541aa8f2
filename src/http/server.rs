//! HTTP server setup.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve each connection on its own task with hyper's HTTP/1.1 server,
//!   upgrades enabled so CONNECT can take over the raw stream
//! - Route every request through the `Dispatcher`
//! - Stop accepting on shutdown, then drain connections and tunnels

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::http::dispatch::Dispatcher;
use crate::http::forward::{router, ForwardState};
use crate::http::tunnel::TunnelHandler;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};

/// HTTP server for the forward proxy.
pub struct HttpServer {
    config: Arc<ProxyConfig>,
    dispatcher: Dispatcher,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let tracker = ConnectionTracker::new();
        let tunnel = TunnelHandler::new(&config.timeouts, tracker.clone());
        let forward = router(ForwardState::new(&config));

        Self {
            config: Arc::new(config),
            dispatcher: Dispatcher::new(tunnel, forward),
            tracker,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Live client connections plus live tunnels.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Run the server until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Starting proxy server");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(ListenerError::Accept(e)) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    let dispatcher = self.dispatcher.clone();
                    let guard = self.tracker.track();
                    tokio::spawn(serve_connection(stream, peer, dispatcher, guard, permit));
                }
            }
        }

        let grace = self.config.timeouts.shutdown_grace();
        if tokio::time::timeout(grace, self.tracker.wait_idle()).await.is_err() {
            tracing::warn!(
                connections = self.tracker.active_connections(),
                tunnels = self.tracker.active_tunnels(),
                "Shutdown grace period elapsed, abandoning what is still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let id = guard.id();
    tracing::debug!(connection_id = %id, peer = %peer, "Serving connection");

    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(id);
        let dispatcher = dispatcher.clone();
        async move { Ok::<_, Infallible>(dispatcher.dispatch(request).await) }
    });

    // No generated Date header: the CONNECT acknowledgment must be the bare
    // status line, and forwarded responses carry the origin's own Date.
    if let Err(e) = http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .auto_date_header(false)
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
    {
        tracing::debug!(connection_id = %id, peer = %peer, error = %e, "Connection error");
    }
}
