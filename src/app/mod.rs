//! Application Layer
//!
//! - chain: dial + optional encryption + disguise for one request
//! - negotiator: control request → chain → grant/reject → relay
//! - runtime: listener lifecycle and drain
//! - signals: process shutdown triggers

mod chain;
mod negotiator;
mod runtime;
pub mod signals;

pub use chain::{ChainBuilder, TransportConfig};
pub use negotiator::Negotiator;
pub use runtime::{Runtime, State};
