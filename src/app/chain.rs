//! Transport Chain Builder
//!
//! ```text
//! dial(remote_address) → [encryption(server_name)] → disguise(path, server_name)
//! ```
//!
//! Strictly sequential; the first failing step ends the build. Every
//! intermediate stream is moved into the next step, so a failed step
//! drops (closes) whatever was opened before it exactly once.

use std::sync::Arc;

use tracing::debug;

use crate::common::{Address, Result, Stream};
use crate::error::Error;
use crate::protocol::Args;
use crate::session::{LayerFactory, Session};
use crate::transport::Transport;

/// Per-connection transport parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// `host:port` of the outbound endpoint
    pub remote_address: String,
    /// Path handed to the disguise layer; empty means its default
    pub path: String,
    /// Non-empty selects the encryption layer
    pub encryption_kind: String,
    /// Server name for encryption validation and the disguise host
    pub server_name: String,
}

impl TransportConfig {
    /// Extract the recognized keys; absent keys stay empty
    pub fn from_args(args: &Args) -> Self {
        let get = |key: &str| args.get(key).unwrap_or_default().to_string();

        Self {
            remote_address: get("addr"),
            path: get("path"),
            encryption_kind: get("tls"),
            server_name: get("servername"),
        }
    }
}

/// Builds one outbound stream per request
pub struct ChainBuilder {
    transport: Arc<dyn Transport>,
    layers: Arc<dyn LayerFactory>,
}

impl ChainBuilder {
    pub fn new(transport: Arc<dyn Transport>, layers: Arc<dyn LayerFactory>) -> Self {
        Self { transport, layers }
    }

    /// Dial and wrap according to `config`
    pub async fn build(&self, config: &TransportConfig) -> Result<Stream> {
        if config.remote_address.is_empty() {
            return Err(Error::Config("no remote address (addr) given".into()));
        }
        let remote = Address::parse(&config.remote_address)?;
        let steps = self.steps(config)?;

        debug!("Dialing {}", remote);
        let mut stream = self.transport.connect(&remote).await?;

        for step in &steps {
            debug!("Applying {} layer", step.name());
            stream = step.wrap_client(stream).await?;
        }

        Ok(stream)
    }

    /// Ordered wrapping steps for a request
    fn steps(&self, config: &TransportConfig) -> Result<Vec<Box<dyn Session>>> {
        let mut steps = Vec::with_capacity(2);

        if !config.encryption_kind.is_empty() {
            steps.push(
                self.layers
                    .encryption(&config.encryption_kind, &config.server_name)?,
            );
        }
        steps.push(self.layers.disguise(&config.path, &config.server_name)?);

        Ok(steps)
    }
}
