//! webtunnel-client - managed pluggable-transport client
//!
//! # Architecture
//!
//! ```text
//! SOCKS5 control listener (protocol)
//! → Negotiator: args → TransportConfig
//! → ChainBuilder: dial (transport) → [TLS] → HTTP upgrade (session)
//! → relay (common)
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── common/          # Stream, Address, relay
//! ├── transport/       # Raw TCP dial and listen
//! ├── session/         # TLS and HTTP upgrade wrapping layers
//! ├── protocol/        # SOCKS5 control listener, args, status lines
//! ├── app/             # Chain builder, negotiator, runtime, signals
//! └── config.rs        # TOR_PT_* environment
//! ```

// Core types
pub mod common;
pub mod error;

// Layered architecture
pub mod transport;
pub mod session;
pub mod protocol;
pub mod app;

pub mod config;

// Re-exports for convenience
pub use common::{Address, Stream};
pub use error::{Error, Result};
pub use config::ClientInfo;

pub use app::{ChainBuilder, Negotiator, Runtime, State, TransportConfig};
pub use protocol::{Reporter, SocksConn};
pub use session::{DefaultLayers, LayerFactory, Session};
pub use transport::{TcpTransport, Transport};
