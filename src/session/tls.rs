//! TLS session

use std::sync::Arc;

use async_trait::async_trait;
use tokio_rustls::rustls::{pki_types::ServerName, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::common::{Result, Stream};
use crate::error::Error;

use super::Session;

/// Client config trusting the bundled webpki roots
pub(super) fn default_client_config() -> Arc<ClientConfig> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// TLS wrapper for encrypting streams
///
/// The server name is used both as SNI and for certificate validation.
pub struct TlsSession {
    connector: TlsConnector,
    server_name: String,
}

impl TlsSession {
    pub fn new(config: Arc<ClientConfig>, server_name: impl Into<String>) -> Self {
        Self {
            connector: TlsConnector::from(config),
            server_name: server_name.into(),
        }
    }

    fn server_name(&self) -> Result<ServerName<'static>> {
        if self.server_name.is_empty() {
            return Err(Error::Handshake("TLS server name required".into()));
        }

        ServerName::try_from(self.server_name.clone())
            .map_err(|_| Error::Handshake(format!("Invalid server name: {}", self.server_name)))
    }
}

#[async_trait]
impl Session for TlsSession {
    async fn wrap_client(&self, stream: Stream) -> Result<Stream> {
        let domain = self.server_name()?;

        debug!("TLS: starting handshake with {}", self.server_name);
        let tls_stream = self
            .connector
            .connect(domain, stream)
            .await
            .map_err(|e| Error::Handshake(format!("TLS handshake failed: {}", e)))?;

        Ok(Box::new(tls_stream))
    }

    fn name(&self) -> &'static str {
        "tls"
    }
}
