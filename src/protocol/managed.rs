//! Managed transport reporting
//!
//! Line-oriented status messages written to the parent process on
//! stdout. Each line is flushed immediately.

use std::io::Write;

use crate::common::Address;
use crate::error::Result;

/// Managed transport protocol version this client speaks
pub const PT_VERSION: &str = "1";

/// Writes managed-transport status lines
pub struct Reporter<W: Write> {
    out: W,
}

impl Reporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn version(&mut self) -> Result<()> {
        self.line(&format!("VERSION {}", PT_VERSION))
    }

    pub fn version_error(&mut self) -> Result<()> {
        self.line("VERSION-ERROR no-version")
    }

    pub fn env_error(&mut self, msg: &str) -> Result<()> {
        self.line(&format!("ENV-ERROR {}", msg))
    }

    pub fn proxy_error(&mut self, msg: &str) -> Result<()> {
        self.line(&format!("PROXY-ERROR {}", msg))
    }

    /// Announce a ready SOCKS5 listener for a method
    pub fn cmethod(&mut self, name: &str, addr: &Address) -> Result<()> {
        self.line(&format!("CMETHOD {} socks5 {}", name, addr))
    }

    pub fn cmethod_error(&mut self, name: &str, msg: &str) -> Result<()> {
        self.line(&format!("CMETHOD-ERROR {} {}", name, msg))
    }

    pub fn cmethods_done(&mut self) -> Result<()> {
        self.line("CMETHODS DONE")
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, msg: &str) -> Result<()> {
        // One message per line, whatever the error text contains
        let msg = msg.replace(['\r', '\n'], " ");
        writeln!(self.out, "{}", msg)?;
        self.out.flush()?;
        Ok(())
    }
}
