//! TCP Transport implementation

use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::common::{Address, Result, Stream};
use crate::error::Error;

use super::{Listener, Transport};

/// errno values for descriptor exhaustion (EMFILE, ENFILE)
const EMFILE: i32 = 24;
const ENFILE: i32 = 23;

/// TCP transport - raw TCP connections
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, addr: &Address) -> Result<Stream> {
        let connected = match addr {
            Address::Socket(socket_addr) => TcpStream::connect(socket_addr).await,
            Address::Domain(domain, port) => TcpStream::connect((domain.as_str(), *port)).await,
        };
        let stream = connected.map_err(|source| Error::Dial {
            addr: addr.to_string(),
            source,
        })?;

        disable_nagle(&stream);
        Ok(Box::new(stream))
    }

    async fn bind(&self, addr: &Address) -> Result<Box<dyn Listener>> {
        let socket_addr = match addr {
            Address::Socket(s) => *s,
            Address::Domain(_, _) => {
                return Err(Error::Config("Cannot bind to domain address".into()));
            }
        };

        let listener = TcpListener::bind(socket_addr).await?;
        Ok(Box::new(TcpListenerWrapper { listener }))
    }
}

/// Wrapper for TcpListener to implement Listener trait
struct TcpListenerWrapper {
    listener: TcpListener,
}

#[async_trait]
impl Listener for TcpListenerWrapper {
    async fn accept(&self) -> Result<(Stream, Address)> {
        let (stream, addr) = self.listener.accept().await.map_err(|source| Error::Accept {
            transient: is_transient_accept_error(&source),
            source,
        })?;
        disable_nagle(&stream);
        Ok((Box::new(stream), Address::Socket(addr)))
    }

    fn local_addr(&self) -> Result<Address> {
        Ok(Address::Socket(self.listener.local_addr()?))
    }
}

/// Disable Nagle's algorithm for lower latency.
///
/// Failure only costs latency on this one socket; some platforms refuse
/// the option once the peer has reset the connection.
fn disable_nagle(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY: {}", e);
    }
}

/// Accept failures that leave the listening socket usable
fn is_transient_accept_error(err: &std::io::Error) -> bool {
    match err.kind() {
        ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::Interrupted
        | ErrorKind::WouldBlock
        | ErrorKind::TimedOut => true,
        _ => matches!(err.raw_os_error(), Some(EMFILE) | Some(ENFILE)),
    }
}
