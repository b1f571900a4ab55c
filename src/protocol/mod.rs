//! Control Protocol Layer
//!
//! Responsibilities:
//! - SOCKS5 handshake with the local client application
//! - Transport argument parsing
//! - Managed-transport status reporting to the parent process

mod args;
pub mod managed;
mod socks5;

pub use args::Args;
pub use managed::Reporter;
pub use socks5::{SocksConn, SocksRequest};
