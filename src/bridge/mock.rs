//! Mock native boundary for testing.
//!
//! `MockBridge` simulates the serial backend without hardware: scripted
//! per-command failures, per-method call counters, forced status drift, and
//! manual event emission.

use super::error::BridgeError;
use super::traits::NativePortBridge;
use crate::events::CallerEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 64;

/// Number of times each boundary method has been invoked.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub connect: usize,
    pub disconnect: usize,
    pub start_listening: usize,
    pub stop_listening: usize,
    pub status: usize,
}

impl CallCounts {
    /// Total boundary calls, commands and status queries alike.
    pub fn total(&self) -> usize {
        self.list
            + self.connect
            + self.disconnect
            + self.start_listening
            + self.stop_listening
            + self.status
    }
}

#[derive(Debug, Default)]
struct MockBridgeState {
    ports: Vec<String>,
    connected: bool,
    listening: bool,
    fail_list: Option<String>,
    fail_connect: Option<String>,
    fail_disconnect: Option<String>,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    connect_delay: Option<std::time::Duration>,
    calls: CallCounts,
}

/// Scriptable in-memory implementation of [`NativePortBridge`].
///
/// Successful commands update the mock's own connected/listening flags the
/// way a real backend would. A failed disconnect still drops the listening
/// flag (the driver tears the listener down even when the ack is lost),
/// which is the partial-success case the manager's re-sync exists for.
#[derive(Clone)]
pub struct MockBridge {
    state: Arc<Mutex<MockBridgeState>>,
    events: broadcast::Sender<CallerEvent>,
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBridge {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Arc::new(Mutex::new(MockBridgeState::default())),
            events,
        }
    }

    /// Create a mock that will report the given ports.
    pub fn with_ports<S: Into<String>>(ports: impl IntoIterator<Item = S>) -> Self {
        let bridge = Self::new();
        bridge.set_ports(ports);
        bridge
    }

    /// Replace the port listing returned by `list_com_ports`.
    pub fn set_ports<S: Into<String>>(&self, ports: impl IntoIterator<Item = S>) {
        self.state.lock().ports = ports.into_iter().map(Into::into).collect();
    }

    /// Script `list_com_ports` to fail with the given message.
    pub fn fail_list(&self, message: impl Into<String>) {
        self.state.lock().fail_list = Some(message.into());
    }

    /// Script `connect_com_port` to fail with the given message.
    pub fn fail_connect(&self, message: impl Into<String>) {
        self.state.lock().fail_connect = Some(message.into());
    }

    /// Script `disconnect_com_port` to fail with the given message.
    pub fn fail_disconnect(&self, message: impl Into<String>) {
        self.state.lock().fail_disconnect = Some(message.into());
    }

    /// Script `start_caller_id_listening` to fail with the given message.
    pub fn fail_start_listening(&self, message: impl Into<String>) {
        self.state.lock().fail_start = Some(message.into());
    }

    /// Script `stop_caller_id_listening` to fail with the given message.
    pub fn fail_stop_listening(&self, message: impl Into<String>) {
        self.state.lock().fail_stop = Some(message.into());
    }

    /// Delay connect responses, for exercising overlapping-call handling.
    pub fn set_connect_delay(&self, delay: std::time::Duration) {
        self.state.lock().connect_delay = Some(delay);
    }

    /// Overwrite the reported status flags, simulating backend-side drift
    /// (e.g. the port was physically unplugged mid-operation).
    pub fn force_status(&self, connected: bool, listening: bool) {
        let mut st = self.state.lock();
        st.connected = connected;
        st.listening = listening;
    }

    /// Snapshot of the per-method call counters.
    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    /// Emit a caller-ID received event on the stream.
    pub fn emit_caller_id(&self, payload: impl Into<String>) {
        let _ = self.events.send(CallerEvent::Received(payload.into()));
    }

    /// Emit a caller-ID error event on the stream.
    pub fn emit_error(&self, message: impl Into<String>) {
        let _ = self.events.send(CallerEvent::Error(message.into()));
    }
}

#[async_trait]
impl NativePortBridge for MockBridge {
    async fn list_com_ports(&self) -> Result<Vec<String>, BridgeError> {
        let mut st = self.state.lock();
        st.calls.list += 1;
        if let Some(msg) = &st.fail_list {
            return Err(BridgeError::command(msg.clone()));
        }
        Ok(st.ports.clone())
    }

    async fn connect_com_port(&self, _port_name: &str) -> Result<(), BridgeError> {
        let delay = {
            let mut st = self.state.lock();
            st.calls.connect += 1;
            st.connect_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut st = self.state.lock();
        if let Some(msg) = &st.fail_connect {
            return Err(BridgeError::command(msg.clone()));
        }
        st.connected = true;
        Ok(())
    }

    async fn disconnect_com_port(&self) -> Result<(), BridgeError> {
        let mut st = self.state.lock();
        st.calls.disconnect += 1;
        st.listening = false;
        if let Some(msg) = &st.fail_disconnect {
            return Err(BridgeError::command(msg.clone()));
        }
        st.connected = false;
        Ok(())
    }

    async fn start_caller_id_listening(&self) -> Result<(), BridgeError> {
        let mut st = self.state.lock();
        st.calls.start_listening += 1;
        if let Some(msg) = &st.fail_start {
            return Err(BridgeError::command(msg.clone()));
        }
        st.listening = st.connected;
        Ok(())
    }

    async fn stop_caller_id_listening(&self) -> Result<(), BridgeError> {
        let mut st = self.state.lock();
        st.calls.stop_listening += 1;
        if let Some(msg) = &st.fail_stop {
            return Err(BridgeError::command(msg.clone()));
        }
        st.listening = false;
        Ok(())
    }

    async fn get_connection_status(&self) -> bool {
        let mut st = self.state.lock();
        st.calls.status += 1;
        st.connected
    }

    async fn get_listening_status(&self) -> bool {
        let mut st = self.state.lock();
        st.calls.status += 1;
        st.listening
    }

    fn subscribe(&self) -> broadcast::Receiver<CallerEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for MockBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("MockBridge")
            .field("ports", &st.ports)
            .field("connected", &st.connected)
            .field("listening", &st.listening)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_commands_track_backend_flags() {
        let bridge = MockBridge::with_ports(["COM3", "COM5"]);
        assert_eq!(
            bridge.list_com_ports().await.unwrap(),
            vec!["COM3".to_string(), "COM5".to_string()]
        );

        bridge.connect_com_port("COM5").await.unwrap();
        assert!(bridge.get_connection_status().await);

        bridge.start_caller_id_listening().await.unwrap();
        assert!(bridge.get_listening_status().await);

        bridge.disconnect_com_port().await.unwrap();
        assert!(!bridge.get_connection_status().await);
        assert!(!bridge.get_listening_status().await);
    }

    #[tokio::test]
    async fn scripted_failure_carries_message() {
        let bridge = MockBridge::new();
        bridge.fail_connect("access denied");
        let err = bridge.connect_com_port("COM9").await.unwrap_err();
        assert_eq!(err.to_string(), "access denied");
        assert!(!bridge.get_connection_status().await);
    }

    #[tokio::test]
    async fn call_counters_accumulate() {
        let bridge = MockBridge::new();
        let _ = bridge.list_com_ports().await;
        let _ = bridge.connect_com_port("COM1").await;
        let _ = bridge.get_connection_status().await;
        let counts = bridge.calls();
        assert_eq!(counts.list, 1);
        assert_eq!(counts.connect, 1);
        assert_eq!(counts.status, 1);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn failed_disconnect_still_stops_listening() {
        let bridge = MockBridge::new();
        bridge.connect_com_port("COM1").await.unwrap();
        bridge.start_caller_id_listening().await.unwrap();
        bridge.fail_disconnect("timeout");

        assert!(bridge.disconnect_com_port().await.is_err());
        assert!(bridge.get_connection_status().await);
        assert!(!bridge.get_listening_status().await);
    }

    #[tokio::test]
    async fn emitted_events_reach_subscribers() {
        let bridge = MockBridge::new();
        let mut rx = bridge.subscribe();
        bridge.emit_caller_id("+905551234567");
        assert_eq!(
            rx.recv().await.unwrap(),
            CallerEvent::Received("+905551234567".into())
        );
    }
}
