//! Port catalog accessor.
//!
//! Thin query over the native boundary's port enumeration, plus a snapshot
//! type so UI reads never hit the boundary.

use crate::bridge::NativePortBridge;
use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};

/// Query the boundary for currently available ports.
///
/// The order is whatever the backend reported; enumeration order can carry
/// meaning, so it is never re-sorted. Failure surfaces as
/// [`SessionError::PortList`]; callers must show the error state, not a
/// silent empty list.
pub async fn list_ports(bridge: &dyn NativePortBridge) -> SessionResult<Vec<String>> {
    bridge
        .list_com_ports()
        .await
        .map_err(|e| SessionError::PortList(e.to_string()))
}

/// The last successful port listing.
///
/// Port names are opaque; uniqueness is only guaranteed within one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCatalog {
    ports: Vec<String>,
}

impl PortCatalog {
    /// Replace the snapshot with a fresh listing.
    pub fn update(&mut self, ports: Vec<String>) {
        self.ports = ports;
    }

    /// Ports in the order the backend reported them.
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Whether the named port appeared in this snapshot.
    pub fn contains(&self, port_name: &str) -> bool {
        self.ports.iter().any(|p| p == port_name)
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
