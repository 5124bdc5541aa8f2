//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound operation:
//!     tunnel dial        → timeouts.rs (connect deadline)
//!     tunnel relay read  → timeouts.rs (idle deadline)
//!     forward connect    → hyper-util connector timeout
//!     forward round trip → timeouts.rs (request deadline)
//! ```
//!
//! # Design Decisions
//! - Deadlines are opt-in; unset means no limit
//! - No retries: one upstream failure is terminal for its request

pub mod timeouts;
