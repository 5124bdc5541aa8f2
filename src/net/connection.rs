//! Connection and tunnel accounting.
//!
//! Every accepted client connection and every established tunnel holds a
//! `ConnectionGuard`. A tunnel outlives the HTTP connection it was upgraded
//! from, so it is tracked on its own. Shutdown drains both.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Process-wide id source; ids only need to be unique.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier carried on log events for one connection or tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a guard is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracked {
    Connection,
    Tunnel,
}

#[derive(Debug, Default)]
struct Counts {
    connections: AtomicU64,
    tunnels: AtomicU64,
    /// Signalled whenever the last guard is released.
    idle: Notify,
}

impl Counts {
    fn total(&self) -> u64 {
        self.connections.load(Ordering::SeqCst) + self.tunnels.load(Ordering::SeqCst)
    }

    fn slot(&self, kind: Tracked) -> &AtomicU64 {
        match kind {
            Tracked::Connection => &self.connections,
            Tracked::Tunnel => &self.tunnels,
        }
    }
}

/// Shared counters of live client connections and tunnels.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counts: Arc<Counts>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly accepted client connection.
    pub fn track(&self) -> ConnectionGuard {
        self.guard(Tracked::Connection, ConnectionId::new())
    }

    /// Count an established tunnel. It keeps the id of the client connection
    /// it came from so both show up under one id in the logs.
    pub fn track_tunnel(&self, id: ConnectionId) -> ConnectionGuard {
        self.guard(Tracked::Tunnel, id)
    }

    fn guard(&self, kind: Tracked, id: ConnectionId) -> ConnectionGuard {
        self.counts.slot(kind).fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            counts: Arc::clone(&self.counts),
            kind,
            id,
        }
    }

    pub fn active_connections(&self) -> u64 {
        self.counts.connections.load(Ordering::SeqCst)
    }

    pub fn active_tunnels(&self) -> u64 {
        self.counts.tunnels.load(Ordering::SeqCst)
    }

    /// Connections plus tunnels.
    pub fn active_count(&self) -> u64 {
        self.counts.total()
    }

    /// Resolve once nothing is tracked.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.counts.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Held for the lifetime of a connection or tunnel.
#[derive(Debug)]
pub struct ConnectionGuard {
    counts: Arc<Counts>,
    kind: Tracked,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn kind(&self) -> Tracked {
        self.kind
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counts.slot(self.kind).fetch_sub(1, Ordering::SeqCst);
        if self.counts.total() == 0 {
            self.counts.idle.notify_waiters();
        }
        tracing::trace!(connection_id = %self.id, kind = ?self.kind, "Released");
    }
}
