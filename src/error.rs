//! Session-level error types.
//!
//! These are the errors the UI layer sees. Boundary-originated variants carry
//! the raw message from the native layer; precondition variants are
//! synthesized locally without contacting the boundary.

use thiserror::Error;

/// Errors surfaced by the session manager and port catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Port enumeration failed at the native boundary.
    #[error("failed to list ports: {0}")]
    PortList(String),

    /// The connect command was rejected by the native boundary.
    #[error("failed to connect: {0}")]
    Connect(String),

    /// The disconnect command was rejected by the native boundary.
    ///
    /// Local state still reflects the disconnection intent; the post-command
    /// re-sync decides the final flags.
    #[error("failed to disconnect: {0}")]
    Disconnect(String),

    /// The start/stop-listening command was rejected by the native boundary.
    #[error("failed to change listening state: {0}")]
    Listen(String),

    /// Operation requires an established connection.
    #[error("not connected to a port")]
    NotConnected,

    /// Operation requires an active caller-ID listener.
    #[error("not listening for caller ID")]
    NotListening,

    /// A connection is already established; disconnect first.
    #[error("already connected")]
    AlreadyConnected,

    /// Caller-ID listening is already active.
    #[error("already listening for caller ID")]
    AlreadyListening,

    /// The supplied port identifier is unusable (empty).
    #[error("invalid port name: {0:?}")]
    InvalidPort(String),

    /// Another state-changing operation is still in flight.
    #[error("another session operation is in progress")]
    Busy,
}

impl SessionError {
    /// True for errors synthesized locally, without any boundary call.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::NotListening
                | Self::AlreadyConnected
                | Self::AlreadyListening
                | Self::InvalidPort(_)
                | Self::Busy
        )
    }
}

/// Convenient Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
