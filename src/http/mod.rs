//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, upgrades enabled)
//!     → dispatch.rs (route on method)
//!         CONNECT → tunnel.rs (take raw stream, dial, acknowledge)
//!                     → relay.rs (copy both directions until EOF)
//!         other   → forward.rs (clone request, round trip, stream response)
//!                     → headers.rs (which headers cross the proxy)
//! ```

pub mod dispatch;
pub mod forward;
pub mod headers;
pub mod relay;
pub mod server;
pub mod tunnel;

pub use dispatch::{route, Dispatcher, Route};
pub use headers::HeaderPolicy;
pub use server::HttpServer;
pub use tunnel::{TunnelHandler, TunnelTarget};
