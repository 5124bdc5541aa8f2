//! Forward HTTP/HTTPS proxy built on Tokio, hyper and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    FORWARD PROXY                     │
//!                     │                                                      │
//!   Client            │  ┌─────────┐    ┌─────────┐    ┌────────────┐        │
//!   ──────────────────┼─▶│   net   │───▶│  http   │───▶│  dispatch  │        │
//!                     │  │listener │    │ server  │    └─────┬──────┘        │
//!                     │  └─────────┘    └─────────┘          │               │
//!                     │                      CONNECT ┌───────┴───────┐ other │
//!                     │                              ▼               ▼       │
//!                     │                       ┌────────────┐  ┌────────────┐ │
//!                     │                       │   tunnel   │  │  forward   │ │
//!                     │                       │ dial+relay │  │ round trip │ │
//!                     │                       └─────┬──────┘  └─────┬──────┘ │
//!                     │                             │ raw bytes     │ HTTP   │
//!                     └─────────────────────────────┼───────────────┼────────┘
//!                                                   ▼               ▼
//!                                              Destination       Origin
//! ```
//!
//! Cross-cutting: `config` (TOML + CLI), `observability` (tracing, metrics),
//! `resilience` (optional deadlines), `lifecycle` (signals, shutdown).

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
