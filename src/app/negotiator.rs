//! Connection Negotiator
//!
//! Turns an accepted control request into a transport chain, answers
//! the request, and relays on success.

use tracing::{info, warn};

use crate::common::{relay, Address, RelayStats, Result, Stream};
use crate::protocol::SocksConn;

use super::chain::{ChainBuilder, TransportConfig};

/// Negotiates and relays accepted control connections
pub struct Negotiator {
    builder: ChainBuilder,
}

impl Negotiator {
    pub fn new(builder: ChainBuilder) -> Self {
        Self { builder }
    }

    /// Build the outbound chain and answer the request.
    ///
    /// On success returns `(control, outbound)`. On failure the request
    /// is rejected and both connections are closed.
    pub async fn negotiate(&self, conn: SocksConn) -> Result<(Stream, Stream)> {
        let config = {
            let request = conn.request();
            info!(
                "SOCKS accepted: target {} args [{}]",
                request.target, request.args
            );
            TransportConfig::from_args(&request.args)
        };

        match self.builder.build(&config).await {
            Ok(outbound) => {
                let control = conn.grant(&Address::unspecified()).await?;
                info!("Connected to {}", config.remote_address);
                Ok((control, outbound))
            }
            Err(e) => {
                warn!("{} error: {}", e.kind(), e);
                if let Err(reply_err) = conn.reject(&e).await {
                    warn!("Failed to send rejection: {}", reply_err);
                }
                Err(e)
            }
        }
    }

    /// Negotiate, then relay until both directions have ended
    pub async fn handle(&self, conn: SocksConn) -> Result<RelayStats> {
        let (control, outbound) = self.negotiate(conn).await?;
        let stats = relay(control, outbound).await;
        info!(
            "Copy loop ended (up {} bytes, down {} bytes)",
            stats.uploaded, stats.downloaded
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use crate::app::chain::tests::fake_builder;

    /// Client side of a SOCKS5 request carrying `args`
    async fn request_with_args(args: &str) -> (DuplexStream, SocksConn) {
        let (mut client, server) = tokio::io::duplex(4096);

        let mut hello = vec![5, 1, 2, 1, args.len() as u8];
        hello.extend_from_slice(args.as_bytes());
        hello.extend_from_slice(&[1, 0]);
        hello.extend_from_slice(&[5, 1, 0, 1, 0, 0, 0, 0, 0, 0]);
        client.write_all(&hello).await.unwrap();

        let conn = SocksConn::handshake(Box::new(server)).await.unwrap();

        // method choice + auth status
        let mut prelude = [0u8; 4];
        client.read_exact(&mut prelude).await.unwrap();
        assert_eq!(prelude, [5, 2, 1, 0]);

        (client, conn)
    }

    #[tokio::test]
    async fn test_grant_on_success() {
        let (builder, recorder) = fake_builder(false, false, false, false);
        let negotiator = Negotiator::new(builder);
        let (mut client, conn) =
            request_with_args("addr=203.0.113.5:443;tls=enable;servername=example.org;path=/update")
                .await;

        let (_control, _outbound) = negotiator.negotiate(conn).await.unwrap();

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x00);
        assert_eq!(recorder.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_addr_rejected_without_dial() {
        let (builder, recorder) = fake_builder(false, false, false, false);
        let negotiator = Negotiator::new(builder);
        let (mut client, conn) = request_with_args("path=/update").await;

        let err = negotiator.negotiate(conn).await.err().unwrap();
        assert_eq!(err.kind(), "config");
        assert!(recorder.calls().is_empty());

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x01);
    }

    #[tokio::test]
    async fn test_upgrade_failure_rejected_and_closed() {
        let (builder, recorder) = fake_builder(false, false, true, false);
        let negotiator = Negotiator::new(builder);
        let (mut client, conn) = request_with_args("addr=203.0.113.5:443").await;

        let err = negotiator.handle(conn).await.err().unwrap();
        assert_eq!(err.kind(), "upgrade");
        assert_eq!(
            recorder.closed.load(std::sync::atomic::Ordering::SeqCst),
            1
        );

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x01);
    }
}
