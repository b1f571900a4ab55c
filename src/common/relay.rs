//! Relay - bidirectional byte copy between two streams
//!
//! Two one-directional copies run concurrently. Each direction ends on
//! end-of-stream or on a read/write error, half-closes its destination,
//! and never aborts the opposite direction. `relay` returns only after
//! both have finished.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::stream::Stream;

/// Default buffer size for relay operations (32KB)
const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// Byte counts of a finished relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the first stream to the second
    pub uploaded: u64,
    /// Bytes copied from the second stream to the first
    pub downloaded: u64,
}

/// Relay data between `a` and `b` until both directions have terminated.
///
/// Direction errors are recorded as diagnostics only. Both streams are
/// dropped (closed) before returning.
pub async fn relay(a: Stream, b: Stream) -> RelayStats {
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let upload = copy_direction("upload", &mut a_read, &mut b_write);
    let download = copy_direction("download", &mut b_read, &mut a_write);

    let (uploaded, downloaded) = tokio::join!(upload, download);
    debug!("Relay finished (up {} bytes, down {} bytes)", uploaded, downloaded);

    RelayStats {
        uploaded,
        downloaded,
    }
}

async fn copy_direction<R, W>(direction: &'static str, reader: &mut R, writer: &mut W) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    let mut buf = BytesMut::zeroed(RELAY_BUFFER_SIZE);

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Relay {}: end of stream after {} bytes", direction, total);
                break;
            }
            Ok(n) => n,
            Err(e) => {
                debug!("Relay {}: read error after {} bytes: {}", direction, total, e);
                break;
            }
        };

        if let Err(e) = writer.write_all(&buf[..n]).await {
            debug!("Relay {}: write error after {} bytes: {}", direction, total, e);
            break;
        }
        // Flush to ensure data is sent immediately
        if let Err(e) = writer.flush().await {
            debug!("Relay {}: flush error after {} bytes: {}", direction, total, e);
            break;
        }

        total += n as u64;
    }

    // Half-close so the peer sees end-of-stream; the other direction keeps going
    let _ = writer.shutdown().await;
    total
}
