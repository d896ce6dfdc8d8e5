//! Unified error type.

use thiserror::Error;

/// The error type returned by astor-metrics' fallible operations.
///
/// Application-level failures (404, 422, etc.) are still expressed by writing
/// a status through the [`ResponseWriter`](crate::ResponseWriter). This type
/// surfaces infrastructure failures: binding a port, taking over a
/// connection, or loading a metrics configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The response writer lacks an optional capability the caller asked for.
    #[error("capability unsupported: {0}")]
    CapabilityUnsupported(String),

    #[error("connection already hijacked")]
    Hijacked,

    #[error("response head already sent, connection can no longer be hijacked")]
    HeadersSent,

    #[error("upgrade: {0}")]
    Upgrade(#[from] hyper::Error),

    #[error("invalid metrics config: {0}")]
    Config(String),
}
