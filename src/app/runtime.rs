//! Runtime - listener lifecycle
//!
//! ```text
//! Initializing → Running → Draining → Stopped
//! ```
//!
//! - Initializing: bind one SOCKS listener per requested method
//! - Running: accept loops spawn one handling task per connection
//! - Draining: shutdown requested, listeners closed, in-flight relays
//!   continue until they end on their own
//! - Stopped: every handling task has finished

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::common::{Address, Result, Stream};
use crate::config::SUPPORTED_METHODS;
use crate::error::Error;
use crate::protocol::{Reporter, SocksConn};
use crate::transport::{Listener, Transport};

use super::negotiator::Negotiator;

/// Time a client gets to complete the SOCKS handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle state, ordered by progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Initializing,
    Running,
    Draining,
    Stopped,
}

struct MethodListener {
    method: String,
    listener: Box<dyn Listener>,
}

/// Runtime owns the listeners and tracks every handling task
pub struct Runtime {
    listeners: Vec<MethodListener>,
    negotiator: Arc<Negotiator>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    state: watch::Sender<State>,
}

impl Runtime {
    pub fn new(negotiator: Negotiator, shutdown: CancellationToken) -> Self {
        let (state, _) = watch::channel(State::Initializing);
        Self {
            listeners: Vec::new(),
            negotiator: Arc::new(negotiator),
            shutdown,
            tracker: TaskTracker::new(),
            state,
        }
    }

    /// Bind a loopback listener for each requested method and report
    /// the outcome of each, followed by `CMETHODS DONE`.
    pub async fn bind<W: Write>(
        &mut self,
        transport: &dyn Transport,
        methods: &[String],
        reporter: &mut Reporter<W>,
    ) -> Result<()> {
        for method in methods {
            if !SUPPORTED_METHODS.contains(&method.as_str()) {
                reporter.cmethod_error(method, "no such method")?;
                continue;
            }

            let listen = Address::parse("127.0.0.1:0")?;
            let bound = match transport.bind(&listen).await {
                Ok(listener) => listener
                    .local_addr()
                    .map(|addr| (listener, addr)),
                Err(e) => Err(e),
            };

            match bound {
                Ok((listener, addr)) => {
                    info!("Started SOCKS listener for {} at {}", method, addr);
                    reporter.cmethod(method, &addr)?;
                    self.add_listener(method, listener);
                }
                Err(e) => {
                    error!("[{}] Failed to bind listener: {}", method, e);
                    reporter.cmethod_error(method, &e.to_string())?;
                }
            }
        }

        reporter.cmethods_done()
    }

    /// Register an already bound listener
    pub fn add_listener(&mut self, method: impl Into<String>, listener: Box<dyn Listener>) {
        self.listeners.push(MethodListener {
            method: method.into(),
            listener,
        });
    }

    /// Bound addresses per method
    pub fn local_addrs(&self) -> Vec<(String, Address)> {
        self.listeners
            .iter()
            .filter_map(|l| l.listener.local_addr().ok().map(|a| (l.method.clone(), a)))
            .collect()
    }

    /// Watch lifecycle transitions
    pub fn state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Token that triggers draining when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept until shutdown, then drain
    pub async fn run(self) -> Result<()> {
        let Runtime {
            listeners,
            negotiator,
            shutdown,
            tracker,
            state,
        } = self;

        let accept_loops: Vec<JoinHandle<()>> = listeners
            .into_iter()
            .map(|l| {
                tokio::spawn(accept_loop(
                    l,
                    Arc::clone(&negotiator),
                    shutdown.clone(),
                    tracker.clone(),
                ))
            })
            .collect();

        state.send_replace(State::Running);
        info!("Runtime started with {} listener(s)", accept_loops.len());

        shutdown.cancelled().await;
        info!("Stopping, waiting for in-flight connections");

        // Each loop drops (closes) its listener on the way out
        for handle in accept_loops {
            if let Err(e) = handle.await {
                error!("Accept loop panicked: {}", e);
            }
        }
        state.send_replace(State::Draining);

        tracker.close();
        tracker.wait().await;
        state.send_replace(State::Stopped);
        info!("All connections drained");

        Ok(())
    }
}

/// Accept connections for one listener until shutdown or a fatal error
async fn accept_loop(
    entry: MethodListener,
    negotiator: Arc<Negotiator>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    let MethodListener { method, listener } = entry;
    let mut conn_count: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("[{}] Listener closed (accepted {} connections)", method, conn_count);
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, source)) => {
                        conn_count += 1;
                        debug!("[{}] New connection #{} from {}", method, conn_count, source);

                        tracker.spawn(handle_connection(
                            conn_count,
                            stream,
                            Arc::clone(&negotiator),
                            shutdown.clone(),
                            tracker.clone(),
                        ));
                    }
                    Err(e) if e.is_transient() => {
                        warn!("[{}] Transient accept error: {}", method, e);
                    }
                    Err(e @ Error::Accept { .. }) => {
                        error!("[{}] SOCKS accept error: {}", method, e);
                        break;
                    }
                    Err(e) => {
                        // Anything else belongs to the one connection being accepted
                        warn!("[{}] Dropped incoming connection: {}", method, e);
                    }
                }
            }
        }
    }
}

/// One handling task: race the connection's own work against shutdown.
///
/// The work runs as its own tracked task, so losing the race detaches
/// it rather than cancelling it and the drain still waits for it.
async fn handle_connection(
    conn_id: u64,
    stream: Stream,
    negotiator: Arc<Negotiator>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    let work = tracker.spawn(async move {
        let conn = match tokio::time::timeout(HANDSHAKE_TIMEOUT, SocksConn::handshake(stream)).await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                debug!("Connection #{} SOCKS handshake failed: {}", conn_id, e);
                return;
            }
            Err(_) => {
                debug!("Connection #{} SOCKS handshake timed out", conn_id);
                return;
            }
        };

        if let Err(e) = negotiator.handle(conn).await {
            debug!("Connection #{} ended with {} error", conn_id, e.kind());
        }
    });

    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("Connection #{} received shutdown signal", conn_id);
        }
        result = work => {
            if let Err(e) = result {
                error!("Connection #{} handler panicked: {}", conn_id, e);
            }
            debug!("Connection #{} handler ended", conn_id);
        }
    }
}
