//! `[serve]` section configuration.
//!
//! Contains development server settings.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 5277                 # HTTP port number
//! ws_port = 35730             # WebSocket port, the next ports are tried when busy
//! root = "."                  # Directory served to the browser
//! watch = true                # Push file changes to connected pages
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from LAN.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind, shared by HTTP and WebSocket.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// First WebSocket port to try.
    pub ws_port: u16,

    /// Directory served, relative to the config file.
    pub root: PathBuf,

    /// Watch `root` and push changes to connected pages.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5277,
            ws_port: 35730,
            root: PathBuf::from("."),
            watch: true,
        }
    }
}

impl ServeConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.port == self.ws_port {
            return Err(format!(
                "serve.port and serve.ws_port are both {}",
                self.port
            ));
        }
        Ok(())
    }
}
