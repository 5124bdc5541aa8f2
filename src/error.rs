//! Request-scoped error taxonomy.
//!
//! Every variant is terminal for the request (or tunnel) it occurs in.
//! Errors raised before the client connection is upgraded become plain-text
//! HTTP responses; relay errors after the upgrade can only be logged.

use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The server runtime did not hand out the raw client connection.
    #[error("Hijacking not supported")]
    HijackUnsupported,

    /// CONNECT target missing or not a `host:port` authority.
    #[error("Invalid request: {0}")]
    InvalidTarget(String),

    /// Dialing the tunnel destination failed or timed out.
    #[error("{0}")]
    UpstreamUnreachable(String),

    /// The outbound request could not be built from the inbound one.
    #[error("Error creating new request: {0}")]
    RequestConstruction(String),

    /// The forwarded round trip failed.
    #[error("Error sending request: {0}")]
    UpstreamRequest(String),

    /// Read or write failure while copying tunnel bytes.
    #[error("relay I/O error: {0}")]
    Relay(#[from] std::io::Error),
}

impl ProxyError {
    /// Status code used when the error is still reportable over HTTP.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::HijackUnsupported => "hijack_unsupported",
            ProxyError::InvalidTarget(_) => "invalid_target",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::RequestConstruction(_) => "request_construction",
            ProxyError::UpstreamRequest(_) => "upstream_request",
            ProxyError::Relay(_) => "relay",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        metrics::record_error(self.kind());
        (self.status(), self.to_string()).into_response()
    }
}

/// Render an error together with its chain of causes.
///
/// hyper-util's client error only says "client error (Connect)"; the useful
/// part (e.g. "Connection refused") lives in the sources.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
