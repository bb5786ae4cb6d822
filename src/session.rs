//! The caller-ID session manager.
//!
//! Drives the connection lifecycle against the native boundary and owns the
//! session state. Every state-changing operation follows the same two-phase
//! shape: tentative local transition, native command, then an authoritative
//! re-sync that overwrites local flags with boundary ground truth. The UI
//! must never trust optimistic local state longer than one operation cycle.
//!
//! Overlapping state-changing calls are rejected with
//! [`SessionError::Busy`] via a single in-flight token; callers are expected
//! to await each operation fully, but the guard holds even when they don't.
//!
//! No timeouts and no retries live here: once a command is issued it cannot
//! be retracted, and retrying is the caller's decision.

use crate::bridge::NativePortBridge;
use crate::catalog::{self, PortCatalog};
use crate::error::{SessionError, SessionResult};
use crate::state::{SessionPhase, SessionStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Coordinates port discovery, connect/listen lifecycle and status re-sync.
///
/// One instance per composition root, injected where needed (there is no
/// ambient global). Cheap to share behind an `Arc`.
pub struct SessionManager {
    bridge: Arc<dyn NativePortBridge>,
    state: Mutex<SessionStatus>,
    catalog: Mutex<PortCatalog>,
    in_flight: tokio::sync::Mutex<()>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionManager {
    pub fn new(bridge: Arc<dyn NativePortBridge>) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::default());
        Self {
            bridge,
            state: Mutex::new(SessionStatus::default()),
            catalog: Mutex::new(PortCatalog::default()),
            in_flight: tokio::sync::Mutex::new(()),
            status_tx,
        }
    }

    /// Pure read of the last re-synced snapshot. Never contacts the boundary.
    pub fn status(&self) -> SessionStatus {
        self.state.lock().clone()
    }

    /// Watch status snapshots as operations commit them.
    ///
    /// Transient phases (`Connecting`, `Reconciling`, ...) are observable
    /// here while an operation is in flight.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// The last successful port listing.
    pub fn catalog(&self) -> PortCatalog {
        self.catalog.lock().clone()
    }

    /// Re-query the boundary for available ports and update the catalog.
    ///
    /// Callable at any time, including while connected. Never touches session
    /// flags or the selected port; if the selected port vanished from the
    /// new listing, warning the operator is the UI's job.
    pub async fn refresh_ports(&self) -> SessionResult<Vec<String>> {
        let ports = catalog::list_ports(self.bridge.as_ref()).await?;
        debug!(count = ports.len(), "port catalog refreshed");
        self.catalog.lock().update(ports.clone());
        Ok(ports)
    }

    /// Connect to the named port.
    ///
    /// Preconditions (checked locally, no boundary call): not already
    /// connected or listening, and a non-empty port name. On native failure
    /// the session stays disconnected, the selected port is cleared, and the
    /// native message is surfaced as [`SessionError::Connect`].
    pub async fn connect(&self, port_name: &str) -> SessionResult<()> {
        if port_name.trim().is_empty() {
            return Err(SessionError::InvalidPort(port_name.to_string()));
        }
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SessionError::Busy)?;
        {
            let st = self.state.lock();
            if st.connected || st.listening {
                return Err(SessionError::AlreadyConnected);
            }
        }

        self.transition(|st| {
            st.phase = SessionPhase::Connecting;
            st.selected_port = Some(port_name.to_string());
        });

        let command = self.bridge.connect_com_port(port_name).await;
        let retain = match &command {
            Ok(()) => {
                self.transition(|st| st.connected = true);
                Some(port_name.to_string())
            }
            Err(_) => {
                self.transition(|st| {
                    st.connected = false;
                    st.selected_port = None;
                });
                None
            }
        };

        self.reconcile(retain).await;

        match command {
            Ok(()) => {
                info!(port = %port_name, "connected");
                Ok(())
            }
            Err(e) => {
                warn!(port = %port_name, error = %e, "connect rejected by native boundary");
                Err(SessionError::Connect(e.to_string()))
            }
        }
    }

    /// Disconnect from the current port.
    ///
    /// Precondition: connected or listening. The local state moves toward
    /// `Disconnected` regardless of the command outcome (disconnecting
    /// implicitly stops listening); the re-sync afterwards corrects the flags
    /// if the native layer disagrees. A native failure is surfaced as
    /// [`SessionError::Disconnect`] after the re-sync has run.
    pub async fn disconnect(&self) -> SessionResult<()> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SessionError::Busy)?;
        let prior_port = {
            let st = self.state.lock();
            if !st.connected && !st.listening {
                return Err(SessionError::NotConnected);
            }
            st.selected_port.clone()
        };

        self.transition(|st| {
            st.phase = SessionPhase::Disconnecting;
            st.listening = false;
            st.connected = false;
            st.selected_port = None;
        });

        let command = self.bridge.disconnect_com_port().await;
        // The prior port is restored only if the boundary still reports a
        // live connection.
        self.reconcile(prior_port).await;

        match command {
            Ok(()) => {
                info!("disconnected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "disconnect rejected by native boundary");
                Err(SessionError::Disconnect(e.to_string()))
            }
        }
    }

    /// Start caller-ID listening on the connected port.
    ///
    /// Fails fast with [`SessionError::NotConnected`] or
    /// [`SessionError::AlreadyListening`] without contacting the boundary.
    pub async fn start_listening(&self) -> SessionResult<()> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SessionError::Busy)?;
        let retain = {
            let st = self.state.lock();
            if !st.connected {
                return Err(SessionError::NotConnected);
            }
            if st.listening {
                return Err(SessionError::AlreadyListening);
            }
            st.selected_port.clone()
        };

        let command = self.bridge.start_caller_id_listening().await;
        if command.is_ok() {
            self.transition(|st| st.listening = true);
        }
        self.reconcile(retain).await;

        match command {
            Ok(()) => {
                info!("caller-id listening started");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "start-listening rejected by native boundary");
                Err(SessionError::Listen(e.to_string()))
            }
        }
    }

    /// Stop caller-ID listening, returning to plain `Connected`.
    ///
    /// Fails fast with [`SessionError::NotListening`] without contacting the
    /// boundary.
    pub async fn stop_listening(&self) -> SessionResult<()> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SessionError::Busy)?;
        let retain = {
            let st = self.state.lock();
            if !st.listening {
                return Err(SessionError::NotListening);
            }
            st.selected_port.clone()
        };

        self.transition(|st| st.phase = SessionPhase::StoppingListening);

        let command = self.bridge.stop_caller_id_listening().await;
        if command.is_ok() {
            self.transition(|st| st.listening = false);
        }
        self.reconcile(retain).await;

        match command {
            Ok(()) => {
                info!("caller-id listening stopped");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "stop-listening rejected by native boundary");
                Err(SessionError::Listen(e.to_string()))
            }
        }
    }

    /// Apply a tentative local mutation and publish the snapshot.
    fn transition(&self, mutate: impl FnOnce(&mut SessionStatus)) {
        let snapshot = {
            let mut st = self.state.lock();
            mutate(&mut st);
            st.clone()
        };
        let _ = self.status_tx.send(snapshot);
    }

    /// Overwrite local flags with boundary ground truth.
    ///
    /// `retain_port` is kept as the selected port only if the boundary still
    /// reports a connection; otherwise the selection is cleared. A listening
    /// flag without a connection is clamped to false, so the
    /// listening-implies-connected invariant holds after every re-sync.
    async fn reconcile(&self, retain_port: Option<String>) {
        self.transition(|st| st.phase = SessionPhase::Reconciling);

        let connected = self.bridge.get_connection_status().await;
        let listening = self.bridge.get_listening_status().await;
        if listening && !connected {
            debug!("boundary reported listening without connection, clamping");
        }

        self.transition(|st| {
            st.connected = connected;
            st.listening = listening && connected;
            st.selected_port = if connected { retain_port } else { None };
            st.settle_phase();
        });
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockBridge;

    fn manager_with(bridge: &MockBridge) -> SessionManager {
        SessionManager::new(Arc::new(bridge.clone()))
    }

    #[tokio::test]
    async fn status_is_a_pure_read() {
        let bridge = MockBridge::new();
        let manager = manager_with(&bridge);
        let _ = manager.status();
        let _ = manager.status();
        assert_eq!(bridge.calls().total(), 0);
    }

    #[tokio::test]
    async fn connect_rejects_empty_port_locally() {
        let bridge = MockBridge::new();
        let manager = manager_with(&bridge);
        let err = manager.connect("  ").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidPort(_)));
        assert_eq!(bridge.calls().total(), 0);
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let bridge = MockBridge::new();
        let manager = manager_with(&bridge);
        manager.connect("COM3").await.unwrap();
        let err = manager.connect("COM4").await.unwrap_err();
        assert_eq!(err, SessionError::AlreadyConnected);
        assert_eq!(manager.status().selected_port.as_deref(), Some("COM3"));
    }

    #[tokio::test]
    async fn refresh_does_not_touch_session_state() {
        let bridge = MockBridge::with_ports(["COM3"]);
        let manager = manager_with(&bridge);
        manager.connect("COM3").await.unwrap();

        // Selected port vanishes from the catalog; selection must survive.
        bridge.set_ports(["COM7"]);
        let ports = manager.refresh_ports().await.unwrap();
        assert_eq!(ports, vec!["COM7"]);

        let status = manager.status();
        assert!(status.connected);
        assert_eq!(status.selected_port.as_deref(), Some("COM3"));
        assert!(!manager.catalog().contains("COM3"));
    }

    #[tokio::test]
    async fn watch_sees_transient_phases() {
        let bridge = MockBridge::new();
        let manager = manager_with(&bridge);
        let rx = manager.watch_status();

        manager.connect("COM3").await.unwrap();

        // The final committed snapshot is settled and connected.
        let last = rx.borrow().clone();
        assert_eq!(last.phase, SessionPhase::Connected);
        assert!(last.connected);
    }

    #[tokio::test]
    async fn resync_clamps_listening_without_connection() {
        let bridge = MockBridge::new();
        let manager = manager_with(&bridge);
        manager.connect("COM3").await.unwrap();
        manager.start_listening().await.unwrap();

        // Port unplugged mid-operation: the backend loses the connection but
        // still claims an active listener, and rejects the stop command.
        bridge.fail_stop_listening("device gone");
        bridge.force_status(false, true);

        let err = manager.stop_listening().await.unwrap_err();
        assert!(matches!(err, SessionError::Listen(ref m) if m.contains("device gone")));

        let status = manager.status();
        assert!(!status.connected);
        assert!(!status.listening, "listening must imply connected");
        assert_eq!(status.selected_port, None);
    }
}
