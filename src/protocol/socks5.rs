//! SOCKS5 control listener (server side)
//!
//! Clients pass transport arguments in the username/password
//! sub-negotiation; the CONNECT destination is kept for diagnostics.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::trace;

use crate::common::{Address, Result, Stream};
use crate::error::Error;

use super::Args;

const SOCKS5_VERSION: u8 = 0x05;
const AUTH_NONE: u8 = 0x00;
const AUTH_PASSWORD: u8 = 0x02;
const AUTH_NO_ACCEPTABLE: u8 = 0xFF;
const AUTH_PASSWORD_VERSION: u8 = 0x01;

const CMD_CONNECT: u8 = 0x01;

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

const REP_SUCCESS: u8 = 0x00;
const REP_GENERAL_FAILURE: u8 = 0x01;
const REP_CONNECTION_REFUSED: u8 = 0x05;
const REP_TTL_EXPIRED: u8 = 0x06;
const REP_CMD_NOT_SUPPORTED: u8 = 0x07;
const REP_ATYP_NOT_SUPPORTED: u8 = 0x08;

/// A parsed control request
#[derive(Debug, Clone)]
pub struct SocksRequest {
    /// CONNECT destination as sent by the client
    pub target: Address,
    /// Transport arguments
    pub args: Args,
}

/// A control connection whose handshake completed but which has not
/// been answered yet. `grant` and `reject` consume it, so a request is
/// answered at most once.
pub struct SocksConn {
    stream: Stream,
    req: SocksRequest,
}

impl SocksConn {
    /// Run the server side of the SOCKS5 handshake up to the request
    pub async fn handshake(mut stream: Stream) -> Result<Self> {
        // 1. Version and auth methods
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await?;

        if buf[0] != SOCKS5_VERSION {
            return Err(Error::Protocol(format!(
                "Unsupported SOCKS version: {}",
                buf[0]
            )));
        }

        let nmethods = buf[1] as usize;
        let mut methods = vec![0u8; nmethods];
        stream.read_exact(&mut methods).await?;

        // 2. Prefer username/password: that is where arguments travel
        let selected_method = if methods.contains(&AUTH_PASSWORD) {
            AUTH_PASSWORD
        } else if methods.contains(&AUTH_NONE) {
            AUTH_NONE
        } else {
            AUTH_NO_ACCEPTABLE
        };

        stream.write_all(&[SOCKS5_VERSION, selected_method]).await?;

        if selected_method == AUTH_NO_ACCEPTABLE {
            return Err(Error::Protocol("No acceptable auth method".into()));
        }

        // 3. Arguments
        let args = if selected_method == AUTH_PASSWORD {
            read_args(&mut stream).await?
        } else {
            Args::new()
        };

        // 4. Request
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await?;

        if header[0] != SOCKS5_VERSION {
            return Err(Error::Protocol("Invalid SOCKS version in request".into()));
        }

        let cmd = header[1];
        let atyp = header[3];

        let target = match atyp {
            ATYP_IPV4 => {
                let mut addr = [0u8; 4];
                stream.read_exact(&mut addr).await?;
                let port = stream.read_u16().await?;
                Address::Socket(SocketAddr::new(Ipv4Addr::from(addr).into(), port))
            }
            ATYP_DOMAIN => {
                let len = stream.read_u8().await?;
                let mut domain = vec![0u8; len as usize];
                stream.read_exact(&mut domain).await?;
                let port = stream.read_u16().await?;
                Address::Domain(String::from_utf8_lossy(&domain).to_string(), port)
            }
            ATYP_IPV6 => {
                let mut addr = [0u8; 16];
                stream.read_exact(&mut addr).await?;
                let port = stream.read_u16().await?;
                Address::Socket(SocketAddr::new(Ipv6Addr::from(addr).into(), port))
            }
            _ => {
                write_reply(&mut stream, REP_ATYP_NOT_SUPPORTED, &Address::unspecified()).await?;
                return Err(Error::Protocol(format!(
                    "Unsupported address type: {}",
                    atyp
                )));
            }
        };

        if cmd != CMD_CONNECT {
            write_reply(&mut stream, REP_CMD_NOT_SUPPORTED, &Address::unspecified()).await?;
            return Err(Error::Protocol(format!("Unsupported command: {}", cmd)));
        }

        trace!("SOCKS5 request for {} (args: {})", target, args);

        Ok(Self {
            stream,
            req: SocksRequest { target, args },
        })
    }

    pub fn request(&self) -> &SocksRequest {
        &self.req
    }

    /// Report success and hand back the stream for relaying
    pub async fn grant(mut self, bound: &Address) -> Result<Stream> {
        write_reply(&mut self.stream, REP_SUCCESS, bound).await?;
        Ok(self.stream)
    }

    /// Report failure and close the connection
    pub async fn reject(mut self, reason: &Error) -> Result<()> {
        write_reply(&mut self.stream, reply_code(reason), &Address::unspecified()).await?;
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

/// RFC 1929 sub-negotiation. The argument string is username followed
/// by password; a password that is a lone NUL byte is ignored.
async fn read_args(stream: &mut Stream) -> Result<Args> {
    let version = stream.read_u8().await?;
    if version != AUTH_PASSWORD_VERSION {
        return Err(Error::Protocol("Invalid auth version".into()));
    }

    let ulen = stream.read_u8().await?;
    let mut username = vec![0u8; ulen as usize];
    stream.read_exact(&mut username).await?;

    let plen = stream.read_u8().await?;
    let mut password = vec![0u8; plen as usize];
    stream.read_exact(&mut password).await?;

    let mut raw = username;
    if password != [0u8] {
        raw.extend_from_slice(&password);
    }

    let parsed = String::from_utf8(raw)
        .map_err(|_| Error::Protocol("Arguments are not UTF-8".into()))
        .and_then(|s| Args::parse(&s));

    match parsed {
        Ok(args) => {
            stream.write_all(&[AUTH_PASSWORD_VERSION, 0x00]).await?;
            Ok(args)
        }
        Err(e) => {
            stream.write_all(&[AUTH_PASSWORD_VERSION, 0x01]).await?;
            Err(e)
        }
    }
}

async fn write_reply(stream: &mut Stream, code: u8, bound: &Address) -> Result<()> {
    let mut reply = vec![SOCKS5_VERSION, code, 0x00];

    match bound {
        Address::Socket(SocketAddr::V4(v4)) => {
            reply.push(ATYP_IPV4);
            reply.extend_from_slice(&v4.ip().octets());
            reply.extend_from_slice(&v4.port().to_be_bytes());
        }
        Address::Socket(SocketAddr::V6(v6)) => {
            reply.push(ATYP_IPV6);
            reply.extend_from_slice(&v6.ip().octets());
            reply.extend_from_slice(&v6.port().to_be_bytes());
        }
        Address::Domain(domain, port) => {
            let domain = &domain.as_bytes()[..domain.len().min(255)];
            reply.push(ATYP_DOMAIN);
            reply.push(domain.len() as u8);
            reply.extend_from_slice(domain);
            reply.extend_from_slice(&port.to_be_bytes());
        }
    }

    stream.write_all(&reply).await?;
    stream.flush().await?;
    Ok(())
}

/// Map a negotiation failure onto a SOCKS5 reply code
fn reply_code(err: &Error) -> u8 {
    match err {
        Error::Dial { source, .. } => match source.kind() {
            ErrorKind::ConnectionRefused => REP_CONNECTION_REFUSED,
            ErrorKind::TimedOut => REP_TTL_EXPIRED,
            _ => REP_GENERAL_FAILURE,
        },
        _ => REP_GENERAL_FAILURE,
    }
}
