//! Optional deadlines.
//!
//! Every deadline in the proxy is opt-in. `None` means the wrapped operation
//! runs until it completes on its own.

use std::future::Future;
use std::time::Duration;

/// Error returned when a deadline elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(pub Duration);

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadline of {:?} elapsed", self.0)
    }
}

impl std::error::Error for Elapsed {}

/// Run `fut`, giving up after `deadline` if one is set.
pub async fn with_deadline<F: Future>(deadline: Option<Duration>, fut: F) -> Result<F::Output, Elapsed> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| Elapsed(limit)),
        None => Ok(fut.await),
    }
}
