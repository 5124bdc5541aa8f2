//! Bidirectional byte relay for established tunnels.
//!
//! Each direction is its own copy loop over a bounded buffer. When a
//! direction reaches EOF it shuts down the write side of its destination, so
//! the peer observes the half-close while the opposite direction keeps
//! draining. The relay returns only after both directions have finished.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProxyError;
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Copy buffer size per direction.
pub const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// Bytes moved in each direction of a tunnel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
}

/// How a tunnel ended: bytes per direction and each direction's result.
#[derive(Debug)]
pub struct RelayOutcome {
    pub stats: RelayStats,
    pub upload: Result<(), ProxyError>,
    pub download: Result<(), ProxyError>,
}

/// Copy `reader` into `writer` until EOF, then half-close `writer`.
///
/// `copied` is updated as bytes are written, so the count survives an error.
async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    idle_timeout: Option<Duration>,
    copied: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];

    loop {
        let n = with_deadline(idle_timeout, reader.read(&mut buf))
            .await
            .map_err(|elapsed| io::Error::new(io::ErrorKind::TimedOut, elapsed))??;
        if n == 0 {
            break;
        }

        writer.write_all(&buf[..n]).await?;
        *copied += n as u64;
    }

    writer.shutdown().await
}

/// Relay between the client and upstream streams until both directions end.
///
/// Errors are logged per direction and never cut the other direction short.
pub async fn relay<C, U>(
    client: C,
    upstream: U,
    idle_timeout: Option<Duration>,
    id: ConnectionId,
) -> RelayOutcome
where
    C: AsyncRead + AsyncWrite,
    U: AsyncRead + AsyncWrite,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);

    let mut stats = RelayStats::default();

    let upload = copy_half(
        &mut client_read,
        &mut upstream_write,
        idle_timeout,
        &mut stats.client_to_upstream,
    );
    let download = copy_half(
        &mut upstream_read,
        &mut client_write,
        idle_timeout,
        &mut stats.upstream_to_client,
    );

    let (upload, download) = tokio::join!(upload, download);

    let upload = upload.map_err(ProxyError::Relay);
    let download = download.map_err(ProxyError::Relay);
    if let Err(e) = &upload {
        report(id, "upload", e);
    }
    if let Err(e) = &download {
        report(id, "download", e);
    }

    RelayOutcome {
        stats,
        upload,
        download,
    }
}

fn report(id: ConnectionId, direction: &'static str, err: &ProxyError) {
    metrics::record_error(err.kind());
    tracing::warn!(connection_id = %id, direction, kind = err.kind(), error = %err, "Relay direction failed");
}
