//! HTTP upgrade session
//!
//! Makes the outbound connection look like a WebSocket upgrade: the
//! client sends an upgrade request, waits for `101 Switching Protocols`
//! and from then on the connection carries raw bytes (no framing).

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::handshake::{client::generate_key, derive_accept_key};
use tracing::debug;

use crate::common::{PrefixedStream, Result, Stream};
use crate::error::Error;

use super::Session;

/// Upper bound on the response header block
const MAX_HEADER_SIZE: usize = 8192;

const MAX_HEADERS: usize = 32;

/// HTTP upgrade configuration
#[derive(Debug, Clone, Default)]
pub struct HttpUpgradeConfig {
    /// Request path; empty means `/`
    pub path: String,
    /// Host header value
    pub host: String,
}

impl HttpUpgradeConfig {
    fn request_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }
}

/// HTTP upgrade session
pub struct HttpUpgradeSession {
    config: HttpUpgradeConfig,
}

impl HttpUpgradeSession {
    pub fn new(config: HttpUpgradeConfig) -> Self {
        Self { config }
    }

    fn request(&self, key: &str) -> String {
        format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Key: {}\r\n\
             \r\n",
            self.config.request_path(),
            self.config.host,
            key
        )
    }
}

#[async_trait]
impl Session for HttpUpgradeSession {
    async fn wrap_client(&self, mut stream: Stream) -> Result<Stream> {
        let key = generate_key();

        debug!(
            "HTTP upgrade: requesting {} on host {:?}",
            self.config.request_path(),
            self.config.host
        );
        stream
            .write_all(self.request(&key).as_bytes())
            .await
            .map_err(|e| Error::Upgrade(format!("Failed to send upgrade request: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::Upgrade(format!("Failed to send upgrade request: {}", e)))?;

        let mut buf = BytesMut::with_capacity(1024);
        let header_len = loop {
            let n = stream
                .read_buf(&mut buf)
                .await
                .map_err(|e| Error::Upgrade(format!("Failed to read upgrade response: {}", e)))?;
            if n == 0 {
                return Err(Error::Upgrade("Connection closed during upgrade".into()));
            }

            if let Some(len) = parse_response(&buf, &key)? {
                break len;
            }

            if buf.len() >= MAX_HEADER_SIZE {
                return Err(Error::Upgrade("Upgrade response header too large".into()));
            }
        };

        let payload = buf.split_off(header_len).freeze();
        debug!(
            "HTTP upgrade: switched protocols ({} early payload bytes)",
            payload.len()
        );

        Ok(Box::new(PrefixedStream::new(payload, stream)))
    }

    fn name(&self) -> &'static str {
        "http-upgrade"
    }
}

/// Validate a response header block.
///
/// Returns the header length once complete, `None` while partial.
fn parse_response(buf: &[u8], key: &str) -> Result<Option<usize>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);

    let len = match response.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(Error::Upgrade(format!("Malformed upgrade response: {}", e))),
    };

    match response.code {
        Some(101) => {}
        Some(code) => {
            return Err(Error::Upgrade(format!("Unexpected status code {}", code)));
        }
        None => return Err(Error::Upgrade("Missing status code".into())),
    }

    let accept = response
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Sec-WebSocket-Accept"));
    if let Some(accept) = accept {
        if accept.value != derive_accept_key(key.as_bytes()).as_bytes() {
            return Err(Error::Upgrade("Sec-WebSocket-Accept mismatch".into()));
        }
    }

    Ok(Some(len))
}
