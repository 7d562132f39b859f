//! Error types for the gridsync protocol.

use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error categories.
///
/// Everything here aborts the session; the non-fatal conditions (double set
/// of a slot, delivering an empty slot, ...) are logged as warnings instead
/// and never surface as an `Error`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid construction parameters. Not recoverable in place; the
    /// caller must reconstruct the component.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A protocol invariant was broken (double-set sequence, read of an
    /// empty slot, unexpected interval number, reentrant start).
    #[error("protocol violation: {0}")]
    Violation(String),

    /// Partial read/write, unexpected connection close, or an OS-level
    /// readiness failure.
    #[error("transport failure on {link}: {source}")]
    Transport {
        link: &'static str,
        #[source]
        source: io::Error,
    },

    /// A readiness poll exhausted the interval budget with no progress.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}
