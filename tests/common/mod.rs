//! Shared helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use webtunnel_client::protocol::Reporter;
use webtunnel_client::{
    ChainBuilder, DefaultLayers, Negotiator, Runtime, TcpTransport,
};

/// Request heads seen by the upgrade server, one `(request line, host)` per connection
pub type SeenRequests = Arc<Mutex<Vec<(String, String)>>>;

/// Start a server that accepts an HTTP upgrade and then echoes bytes
/// until the client half-closes.
pub async fn spawn_upgrade_echo_server() -> (SocketAddr, SeenRequests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: SeenRequests = Arc::default();

    let seen_by_server = Arc::clone(&seen);
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let seen = Arc::clone(&seen_by_server);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stream);

                let mut request_line = String::new();
                reader.read_line(&mut request_line).await.unwrap();
                let mut host = String::new();
                let mut key = String::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).await.unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        let value = value.trim().to_string();
                        if name.eq_ignore_ascii_case("host") {
                            host = value;
                        } else if name.eq_ignore_ascii_case("sec-websocket-key") {
                            key = value;
                        }
                    }
                }
                seen.lock()
                    .unwrap()
                    .push((request_line.trim_end().to_string(), host));

                let response = format!(
                    "HTTP/1.1 101 Switching Protocols\r\n\
                     Connection: Upgrade\r\n\
                     Upgrade: websocket\r\n\
                     Sec-WebSocket-Accept: {}\r\n\r\n",
                    derive_accept_key(key.as_bytes())
                );
                reader.get_mut().write_all(response.as_bytes()).await.unwrap();

                // Echo, keeping anything the BufReader already buffered
                let mut buf = vec![0u8; 8192];
                loop {
                    let n = match reader.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    if reader.get_mut().write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                let _ = reader.get_mut().shutdown().await;
            });
        }
    });

    (addr, seen)
}

/// Runtime with real TCP + TLS/HTTP-upgrade layers and one webtunnel listener
pub async fn start_runtime() -> (Runtime, SocketAddr) {
    let transport = Arc::new(TcpTransport::new());
    let builder = ChainBuilder::new(transport.clone(), Arc::new(DefaultLayers::new()));
    let mut runtime = Runtime::new(
        Negotiator::new(builder),
        tokio_util::sync::CancellationToken::new(),
    );

    let mut reporter = Reporter::new(std::io::sink());
    runtime
        .bind(transport.as_ref(), &["webtunnel".to_string()], &mut reporter)
        .await
        .unwrap();

    let addr = runtime.local_addrs()[0].1.as_socket().unwrap();
    (runtime, addr)
}

/// SOCKS5 CONNECT carrying `args`; returns the stream and the reply code
pub async fn socks_connect(proxy: SocketAddr, args: &str) -> std::io::Result<(TcpStream, u8)> {
    let mut stream = TcpStream::connect(proxy).await?;

    stream.write_all(&[5, 1, 2]).await?;
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await?;
    assert_eq!(method, [5, 2]);

    let mut auth = vec![1, args.len() as u8];
    auth.extend_from_slice(args.as_bytes());
    auth.extend_from_slice(&[1, 0]);
    stream.write_all(&auth).await?;
    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await?;
    assert_eq!(status, [1, 0]);

    stream.write_all(&[5, 1, 0, 1, 0, 0, 0, 0, 0, 0]).await?;
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await?;

    Ok((stream, reply[1]))
}
