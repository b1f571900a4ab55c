//! Process shutdown triggers
//!
//! SIGTERM and SIGINT always trigger shutdown. When the parent asks for
//! it, end-of-input on stdin is treated like SIGTERM as well.

use tokio::io::AsyncRead;
use tracing::{info, warn};

/// Resolve once the process should start draining
pub async fn shutdown_signal(exit_on_stdin_close: bool) {
    let stdin_closed = async {
        if exit_on_stdin_close {
            wait_for_eof(tokio::io::stdin()).await;
            info!("Synthesizing SIGTERM because of stdin close");
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = terminate() => info!("Received SIGTERM"),
        _ = interrupt() => info!("Received SIGINT"),
        _ = stdin_closed => {}
    }
}

/// Drain a reader until end-of-input or a read error
pub async fn wait_for_eof<R>(mut reader: R)
where
    R: AsyncRead + Unpin,
{
    if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
        warn!("Reading stdin returned error: {}", e);
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_eof_resolves() {
        let (reader, mut writer) = tokio::io::duplex(64);

        let waiter = tokio::spawn(wait_for_eof(reader));
        writer.write_all(b"ignored").await.unwrap();
        assert!(!waiter.is_finished());

        drop(writer);
        tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
