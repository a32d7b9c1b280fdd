//! # domserve
//!
//! Static file server with a server-driven "dynamic DOM" layer: handlers
//! registered on the server react to DOM events observed in the browser and
//! answer with declarative update actions that an injected bridge script
//! applies in place. No page reload, no client framework.
//!
//! One event round trip:
//! 1. The bridge captures a click and builds a full-page snapshot.
//! 2. It POSTs `{selector, type, snapshot}` to the event endpoint.
//! 3. The dispatch engine runs the matching handler against the snapshot.
//! 4. Queued update actions come back as a JSON array and are applied in order.
//!
//! The dynamic layer is strictly best-effort: a page served through domserve
//! stays a working static page even when the endpoint is unreachable.

pub mod action;
pub mod bridge;
pub mod dispatch;
pub mod registry;
pub mod server;
pub mod watch;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use action::{EventRequest, Snapshot, UpdateAction, EVENT_ENDPOINT};
pub use dispatch::{DispatchEngine, EventScope};
pub use registry::{HandlerRegistry, CLICK};
pub use server::{router, serve};

// ---------------------------------------------------------------------------
// Serve Options
// ---------------------------------------------------------------------------

/// Describes HOW to serve.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// TCP port to bind on all interfaces.
    pub port: u16,
    /// Directory served as the site root. A missing directory falls back to
    /// the current working directory at startup.
    pub root: PathBuf,
    /// Restart the process when a served file changes.
    pub watch: bool,
    /// Poll interval of the reload watcher.
    pub watch_interval: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            port: 8000,
            root: PathBuf::from("."),
            watch: false,
            watch_interval: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Serve Error
// ---------------------------------------------------------------------------

/// Errors that abort serving.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
