//! End-to-end tests: SOCKS request → chain → relay → drain

mod common;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use webtunnel_client::State;

use common::{socks_connect, spawn_upgrade_echo_server, start_runtime};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

async fn echo_roundtrip(stream: &mut TcpStream, payload: &[u8]) {
    let (mut reader, mut writer) = stream.split();
    let write = async {
        writer.write_all(payload).await.unwrap();
    };
    let read = async {
        let mut echoed = vec![0u8; payload.len()];
        reader.read_exact(&mut echoed).await.unwrap();
        echoed
    };
    let ((), echoed) = tokio::join!(write, read);
    assert_eq!(echoed, payload);
}

#[tokio::test]
async fn test_relay_through_upgrade_chain() {
    let (echo_addr, seen) = spawn_upgrade_echo_server().await;
    let (runtime, proxy_addr) = start_runtime().await;
    let shutdown = runtime.shutdown_token();
    let run = tokio::spawn(runtime.run());

    let args = format!("addr={};servername=localhost;path=/update", echo_addr);
    let (mut stream, reply) = socks_connect(proxy_addr, &args).await.unwrap();
    assert_eq!(reply, 0x00);

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
    timeout(TEST_TIMEOUT, echo_roundtrip(&mut stream, &payload))
        .await
        .unwrap();

    assert_eq!(
        seen.lock().unwrap().clone(),
        vec![("GET /update HTTP/1.1".to_string(), "localhost".to_string())]
    );

    drop(stream);
    shutdown.cancel();
    timeout(TEST_TIMEOUT, run).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_missing_addr_rejected() {
    let (runtime, proxy_addr) = start_runtime().await;
    let shutdown = runtime.shutdown_token();
    let run = tokio::spawn(runtime.run());

    let (_stream, reply) = socks_connect(proxy_addr, "path=/update").await.unwrap();
    assert_eq!(reply, 0x01);

    shutdown.cancel();
    timeout(TEST_TIMEOUT, run).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_refused_dial_rejected() {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let closed_addr = probe.local_addr().unwrap();
    drop(probe);

    let (runtime, proxy_addr) = start_runtime().await;
    let shutdown = runtime.shutdown_token();
    let run = tokio::spawn(runtime.run());

    let (_stream, reply) = socks_connect(proxy_addr, &format!("addr={}", closed_addr))
        .await
        .unwrap();
    assert_eq!(reply, 0x05);

    shutdown.cancel();
    timeout(TEST_TIMEOUT, run).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_relays() {
    let (echo_addr, _) = spawn_upgrade_echo_server().await;
    let (runtime, proxy_addr) = start_runtime().await;
    let shutdown = runtime.shutdown_token();
    let mut state = runtime.state();
    let run = tokio::spawn(runtime.run());

    let args = format!("addr={};servername=localhost", echo_addr);
    let mut clients = Vec::new();
    for _ in 0..3 {
        let (mut stream, reply) = socks_connect(proxy_addr, &args).await.unwrap();
        assert_eq!(reply, 0x00);
        echo_roundtrip(&mut stream, b"before shutdown").await;
        clients.push(stream);
    }

    shutdown.cancel();
    timeout(TEST_TIMEOUT, state.wait_for(|s| *s >= State::Draining))
        .await
        .unwrap()
        .unwrap();

    // No new accepts once draining
    assert!(TcpStream::connect(proxy_addr).await.is_err());

    // In-flight relays are untouched
    for stream in &mut clients {
        timeout(TEST_TIMEOUT, echo_roundtrip(stream, b"after shutdown"))
            .await
            .unwrap();
    }
    assert!(!run.is_finished());
    assert_eq!(*state.borrow(), State::Draining);

    // Each relay ends naturally once its client half-closes
    for mut stream in clients {
        stream.shutdown().await.unwrap();
        let mut rest = Vec::new();
        timeout(TEST_TIMEOUT, stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert!(rest.is_empty());
    }

    timeout(TEST_TIMEOUT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(*state.borrow(), State::Stopped);
}
