//! Common types and abstractions
//!
//! - Stream: unified async I/O abstraction shared by every layer
//! - Address: network address representation
//! - relay: bidirectional byte copy between two streams

mod address;
mod relay;
mod stream;

pub use address::Address;
pub use relay::{relay, RelayStats};
pub use stream::{AsyncReadWrite, PrefixedStream, Stream};

// Re-export error types from crate root
pub use crate::error::{Error, Result};
