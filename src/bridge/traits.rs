//! The native boundary contract.
//!
//! Defines the `NativePortBridge` trait that allows the real serial backend
//! and a mock implementation to be used interchangeably by the session
//! manager.

use super::error::BridgeError;
use crate::events::CallerEvent;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Command/event interface of the native serial-port backend.
///
/// The session manager treats implementations as an opaque RPC-like boundary:
/// every command suspends the caller until the backend responds, no command
/// can be retracted once issued, and the event stream is unordered relative
/// to command responses.
///
/// Status queries are infallible by contract; they report whatever the
/// backend currently believes, which is exactly what the manager's re-sync
/// overwrites local flags with.
#[async_trait]
pub trait NativePortBridge: Send + Sync {
    /// List currently available serial ports, in enumeration order.
    async fn list_com_ports(&self) -> Result<Vec<String>, BridgeError>;

    /// Open a connection to the named port.
    async fn connect_com_port(&self, port_name: &str) -> Result<(), BridgeError>;

    /// Close the current connection, if any.
    async fn disconnect_com_port(&self) -> Result<(), BridgeError>;

    /// Start delivering caller-ID events on the subscribed stream.
    async fn start_caller_id_listening(&self) -> Result<(), BridgeError>;

    /// Stop delivering caller-ID events.
    async fn stop_caller_id_listening(&self) -> Result<(), BridgeError>;

    /// Ground-truth connection flag.
    async fn get_connection_status(&self) -> bool;

    /// Ground-truth listening flag.
    async fn get_listening_status(&self) -> bool;

    /// Subscribe to the asynchronous caller-ID event stream.
    ///
    /// Only events raised after the subscription are observed.
    fn subscribe(&self) -> broadcast::Receiver<CallerEvent>;
}
