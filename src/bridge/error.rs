//! Native-boundary error type.
//!
//! Kept separate from [`crate::error::SessionError`] so bridge
//! implementations stay independent of session-level policy.

use thiserror::Error;

/// Errors raised by a [`super::NativePortBridge`] implementation.
///
/// The session manager folds these into its own taxonomy; the raw native
/// message is preserved verbatim for the UI.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The native backend is missing or unreachable (driver not loaded,
    /// runtime bridge absent, permissions).
    #[error("native bridge unavailable: {0}")]
    Unavailable(String),

    /// A command reached the backend and was rejected.
    #[error("{0}")]
    Command(String),

    /// An I/O error occurred while talking to the device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a Command error from a message.
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }

    /// Create an Unavailable error from a message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
