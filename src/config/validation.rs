//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges and that
//! addresses and header names actually parse. Every problem is reported,
//! not just the first one.

use std::net::SocketAddr;

use hyper::header::HeaderName;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("'{}' is not a socket address", config.listener.bind_address),
        });
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError {
            field: "listener.max_connections",
            message: "must be greater than 0".to_string(),
        });
    }

    let deadlines = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.relay_idle_secs", config.timeouts.relay_idle_secs),
    ];
    for (field, value) in deadlines {
        if value == Some(0) {
            errors.push(ValidationError {
                field,
                message: "must be greater than 0 when set".to_string(),
            });
        }
    }

    for name in &config.headers.excluded {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError {
                field: "headers.excluded",
                message: format!("'{}' is not a valid header name", name),
            });
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
