//! Header relay policy.
//!
//! Decides which headers cross the proxy in either direction. By default
//! every header is relayed verbatim. With `strip_hop_by_hop` set, headers
//! that describe a single connection are dropped, along with anything the
//! `Connection` header itself names.

use std::collections::HashSet;

use axum::http::{
    header::{self, HeaderName},
    HeaderMap,
};

use crate::config::HeaderConfig;

/// RFC 9110 §7.6.1 connection-specific fields, plus the legacy
/// `Proxy-Connection` still sent by some clients.
pub const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("proxy-connection"),
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Clone, Default)]
pub struct HeaderPolicy {
    strip_hop_by_hop: bool,
    excluded: HashSet<HeaderName>,
}

impl HeaderPolicy {
    /// Relay every header verbatim.
    pub fn pass_through() -> Self {
        Self::default()
    }

    /// Build from configuration. Names that do not parse are skipped;
    /// validation rejects them before this point.
    pub fn from_config(config: &HeaderConfig) -> Self {
        let excluded = config
            .excluded
            .iter()
            .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
            .collect();

        Self {
            strip_hop_by_hop: config.strip_hop_by_hop,
            excluded,
        }
    }

    fn connection_tokens(headers: &HeaderMap) -> HashSet<HeaderName> {
        headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
            .collect()
    }

    /// Whether `name` may be relayed. `named_by_connection` holds the tokens
    /// listed in the source message's `Connection` header.
    fn allows(&self, name: &HeaderName, named_by_connection: &HashSet<HeaderName>) -> bool {
        if self.excluded.contains(name) {
            return false;
        }
        if self.strip_hop_by_hop {
            return !HOP_BY_HOP.contains(name) && !named_by_connection.contains(name);
        }
        true
    }

    /// Append every allowed header of `source` onto `target`.
    ///
    /// Appending keeps repeated names in their original order and never
    /// collapses values that already exist on `target`.
    pub fn copy(&self, source: &HeaderMap, target: &mut HeaderMap) {
        let named_by_connection = if self.strip_hop_by_hop {
            Self::connection_tokens(source)
        } else {
            HashSet::new()
        };

        for (name, value) in source.iter() {
            if self.allows(name, &named_by_connection) {
                target.append(name.clone(), value.clone());
            }
        }
    }
}
