//! Server configuration knobs
//!
//! Defaults are conservative and production-safe: a fixed connection cap, a
//! 30-second idle watchdog and a 10 MiB request body ceiling. Every struct
//! supports struct-update syntax:
//!
//! ```
//! use ember_web::limits::{ConnLimits, ServerLimits};
//! use std::time::Duration;
//!
//! let server = ServerLimits {
//!     max_connections: 2500,
//!     ..ServerLimits::default()
//! };
//! let conn = ConnLimits {
//!     idle_timeout: Duration::from_secs(5),
//!     ..ConnLimits::default()
//! };
//! # let _ = (server, conn);
//! ```

use std::{num::NonZeroUsize, thread, time::Duration};

/// Process-wide limits: worker pool size and admission control.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of reactor worker threads.
    ///
    /// Defaults to the detected hardware parallelism, never less than 1.
    pub workers: usize,

    /// Maximum concurrently open HTTP connections.
    ///
    /// Sockets accepted above the cap are closed immediately. The comparison
    /// is best-effort: workers already in flight may overshoot by a bounded,
    /// harmless amount.
    pub max_connections: usize,

    /// Default port of the binary opcode listener.
    pub neural_port: u16,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            max_connections: 10_000,
            neural_port: 7654,
        }
    }
}

/// Per-connection limits: timeouts and request size ceilings.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Idle watchdog armed on every state of the connection lifecycle.
    ///
    /// A connection that makes no progress within this window is closed
    /// silently.
    pub idle_timeout: Duration,

    /// Maximum buffered request body size in bytes.
    ///
    /// A body of exactly this size is accepted; one byte more answers
    /// `413 Payload Too Large`. Declared `Content-Length` values beyond the
    /// cap are rejected before any body byte is read.
    pub max_body_size: usize,

    /// Maximum size of the request line plus header block in bytes.
    ///
    /// A peer that never sends the header terminator cannot grow the read
    /// buffer past this bound; breach answers `431`.
    pub max_head_size: usize,
}

impl Default for ConnLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
            max_head_size: 64 * 1024,
        }
    }
}
