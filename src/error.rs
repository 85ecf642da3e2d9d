//! Error taxonomy shared between the stream handle and the coordinator.

use thiserror::Error;

/// Classification of a failure surfaced by a [`crate::stream::CloudStream`].
///
/// `InvalidConfig` also covers anomalies caught locally by the coordinator
/// itself (an unknown stream purpose, a malformed locale) before any RPC is
/// ever attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("TLS error")]
    Tls,
    #[error("connectivity error")]
    Connectivity,
    #[error("timeout")]
    Timeout,
    #[error("error connecting")]
    Connecting,
    #[error("invalid configuration")]
    InvalidConfig,
}

/// User-facing code attached to a [`crate::message::ConnectionResult`].
///
/// `Auth` is the default for anything that doesn't map cleanly onto one of
/// the other three - unclassified errors during a connection check fall
/// back to it, same as an unclassified `ErrorKind` would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionCode {
    Tls,
    Connectivity,
    Bandwidth,
    Auth,
}

impl From<ErrorKind> for ConnectionCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Tls => ConnectionCode::Tls,
            ErrorKind::Connectivity => ConnectionCode::Connectivity,
            ErrorKind::Timeout => ConnectionCode::Bandwidth,
            ErrorKind::Connecting | ErrorKind::InvalidConfig => ConnectionCode::Auth,
        }
    }
}
