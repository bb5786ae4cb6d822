//! Session state for the caller-ID connection.
//!
//! Pure data, owned and mutated exclusively by the session manager. UI layers
//! see cloned snapshots only.

use serde::{Deserialize, Serialize};

/// Where the session currently is in its lifecycle.
///
/// `Connecting`, `Disconnecting`, `StoppingListening` and `Reconciling` are
/// transient: they are only observable through the status watch channel while
/// an operation is in flight. Every operation settles back to one of
/// `Disconnected`, `Connected` or `Listening`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Listening,
    Disconnecting,
    StoppingListening,
    /// Local flags are being overwritten with boundary ground truth.
    Reconciling,
}

/// Snapshot of the session as of the last re-sync.
///
/// Invariants, restored by every re-sync:
/// - `listening` implies `connected`
/// - `selected_port` is `Some` only while connected or immediately prior to
///   a connect attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub selected_port: Option<String>,
    pub connected: bool,
    pub listening: bool,
    pub phase: SessionPhase,
}

impl SessionStatus {
    /// Settle the phase from the connected/listening flags.
    pub(crate) fn settle_phase(&mut self) {
        self.phase = if self.listening {
            SessionPhase::Listening
        } else if self.connected {
            SessionPhase::Connected
        } else {
            SessionPhase::Disconnected
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        let status = SessionStatus::default();
        assert_eq!(status.phase, SessionPhase::Disconnected);
        assert!(!status.connected);
        assert!(!status.listening);
        assert!(status.selected_port.is_none());
    }

    #[test]
    fn settle_phase_follows_flags() {
        let mut status = SessionStatus {
            connected: true,
            listening: true,
            ..Default::default()
        };
        status.settle_phase();
        assert_eq!(status.phase, SessionPhase::Listening);

        status.listening = false;
        status.settle_phase();
        assert_eq!(status.phase, SessionPhase::Connected);

        status.connected = false;
        status.settle_phase();
        assert_eq!(status.phase, SessionPhase::Disconnected);
    }

    #[test]
    fn status_serializes_snake_case() {
        let status = SessionStatus {
            selected_port: Some("COM3".into()),
            connected: true,
            listening: false,
            phase: SessionPhase::Connected,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""phase":"connected""#));
        assert!(json.contains(r#""selected_port":"COM3""#));
    }
}
