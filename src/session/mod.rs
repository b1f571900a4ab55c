//! Session Layer
//!
//! Responsibilities:
//! - TLS encryption
//! - HTTP upgrade disguise
//!
//! Each session takes an established stream and hands back a wrapped
//! one. This layer does NOT dial and does NOT parse the control protocol.

mod http_upgrade;
mod tls;

pub use http_upgrade::{HttpUpgradeConfig, HttpUpgradeSession};
pub use tls::TlsSession;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_rustls::rustls::ClientConfig;

use crate::common::{Result, Stream};

/// Session trait for wrapping streams with encryption/framing
///
/// The input stream is consumed; on failure it is dropped (closed)
/// before the error is returned.
#[async_trait]
pub trait Session: Send + Sync {
    /// Wrap a stream (client-side: initiate handshake)
    async fn wrap_client(&self, stream: Stream) -> Result<Stream>;

    /// Layer name for diagnostics
    fn name(&self) -> &'static str;
}

/// Builds the per-request wrapping steps of a transport chain
pub trait LayerFactory: Send + Sync {
    /// Encryption step for a non-empty encryption kind
    fn encryption(&self, kind: &str, server_name: &str) -> Result<Box<dyn Session>>;

    /// Disguise step, always applied last
    fn disguise(&self, path: &str, host: &str) -> Result<Box<dyn Session>>;
}

/// TLS (webpki roots) + HTTP upgrade
pub struct DefaultLayers {
    tls_config: Arc<ClientConfig>,
}

impl DefaultLayers {
    pub fn new() -> Self {
        Self {
            tls_config: tls::default_client_config(),
        }
    }
}

impl Default for DefaultLayers {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerFactory for DefaultLayers {
    fn encryption(&self, _kind: &str, server_name: &str) -> Result<Box<dyn Session>> {
        Ok(Box::new(TlsSession::new(
            Arc::clone(&self.tls_config),
            server_name,
        )))
    }

    fn disguise(&self, path: &str, host: &str) -> Result<Box<dyn Session>> {
        Ok(Box::new(HttpUpgradeSession::new(HttpUpgradeConfig {
            path: path.to_string(),
            host: host.to_string(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layers_names() {
        let layers = DefaultLayers::new();
        let tls = layers.encryption("enable", "example.org").unwrap();
        let upgrade = layers.disguise("/update", "example.org").unwrap();
        assert_eq!(tls.name(), "tls");
        assert_eq!(upgrade.name(), "http-upgrade");
    }
}
