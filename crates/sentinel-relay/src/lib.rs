//! TCP relay in front of the sentinel resolver
//!
//! One [`RelayListener`] per configured logical database accepts client
//! connections and pipes bytes to the resolved master. [`TunnelRunner`]
//! owns the set of listeners and supervises their lifetimes.

pub mod listener;
pub mod runner;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use listener::RelayListener;
pub use runner::TunnelRunner;

/// One tunnelled logical database: the name known to the sentinel and the
/// local port to expose it on. Immutable after configuration load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub local_port: u16,
}

/// Relay errors. These are fatal to the whole runner; per-connection
/// failures are logged and never surface here.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("cannot listen on port {port} for database {name}: {source}")]
    Bind {
        name: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("cannot accept connections on port {port}: {source}")]
    Accept { port: u16, source: std::io::Error },

    #[error("relay listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
