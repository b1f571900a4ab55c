//! Raw byte transports
//!
//! Two roles meet here: dialing the bridge before any session layer is
//! stacked on top, and binding the loopback SOCKS listeners the parent
//! process connects to. Streams leave this module unencrypted and
//! unparsed.

mod tcp;

pub use tcp::TcpTransport;

use async_trait::async_trait;

use crate::common::{Address, Result, Stream};

/// Dials the bridge and binds control listeners.
///
/// A failed dial is `Error::Dial` so the SOCKS reply can name the cause.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, addr: &Address) -> Result<Stream>;

    async fn bind(&self, addr: &Address) -> Result<Box<dyn Listener>>;
}

/// Source of SOCKS client connections, closed on drop.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Next client connection. Only `Error::Accept { transient: false, .. }`
    /// means the listener itself is unusable.
    async fn accept(&self) -> Result<(Stream, Address)>;

    fn local_addr(&self) -> Result<Address>;
}
