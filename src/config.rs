//! Configuration from the managed-transport environment
//!
//! The parent process configures the client entirely through
//! `TOR_PT_*` environment variables; there is no config file.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::protocol::managed::PT_VERSION;

/// Method names this client can serve
pub const SUPPORTED_METHODS: &[&str] = &["webtunnel"];

const ENV_VERSION: &str = "TOR_PT_MANAGED_TRANSPORT_VER";
const ENV_TRANSPORTS: &str = "TOR_PT_CLIENT_TRANSPORTS";
const ENV_PROXY: &str = "TOR_PT_PROXY";
const ENV_EXIT_ON_STDIN_CLOSE: &str = "TOR_PT_EXIT_ON_STDIN_CLOSE";
const ENV_STATE_LOCATION: &str = "TOR_PT_STATE_LOCATION";

/// Client-side managed transport settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Requested method names, in request order
    pub method_names: Vec<String>,
    /// Upstream proxy URL requested by the parent (unsupported)
    pub proxy: Option<String>,
    /// Treat end-of-input on stdin like a termination signal
    pub exit_on_stdin_close: bool,
    /// Directory the parent reserved for transport state
    pub state_location: Option<PathBuf>,
}

impl ClientInfo {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let versions = lookup(ENV_VERSION)
            .ok_or_else(|| Error::Env(format!("no {} environment variable", ENV_VERSION)))?;
        if !versions.split(',').any(|v| v.trim() == PT_VERSION) {
            return Err(Error::Version);
        }

        let transports = lookup(ENV_TRANSPORTS)
            .ok_or_else(|| Error::Env(format!("no {} environment variable", ENV_TRANSPORTS)))?;
        let method_names = parse_method_names(&transports);

        let proxy = lookup(ENV_PROXY).filter(|p| !p.is_empty());
        let exit_on_stdin_close = lookup(ENV_EXIT_ON_STDIN_CLOSE).as_deref() == Some("1");
        let state_location = lookup(ENV_STATE_LOCATION)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            method_names,
            proxy,
            exit_on_stdin_close,
            state_location,
        })
    }
}

/// `*` expands to every supported method
fn parse_method_names(list: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if name == "*" {
            names.extend(SUPPORTED_METHODS.iter().map(|m| m.to_string()));
        } else {
            names.push(name.to_string());
        }
    }
    names.dedup();
    names
}
