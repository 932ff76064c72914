//! livedev - live development bridge between an editor and browser tabs.
//!
//! # Module Structure
//!
//! - `protocol` - session: connections, request/response correlation, verbs
//! - `transport` - WebSocket and in-memory transports
//! - `instrument` - JavaScript function instrumentation for hot-swapping
//! - `observer` - model of the page-side script/stylesheet observer
//! - `live` - live documents: highlighting, sync errors, pushing edits
//! - `embed` - scripts injected into live pages
//! - `config` - `livedev.toml`
//! - `cli` - `livedev serve` and `livedev instrument`

pub mod cli;
pub mod config;
pub mod embed;
pub mod instrument;
pub mod live;
pub mod logger;
pub mod observer;
pub mod protocol;
pub mod transport;
