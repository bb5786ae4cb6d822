//! Caller-ID Bridge Library
//!
//! Client-side session management for a caller-ID serial backend: port
//! discovery, connect/listen/disconnect lifecycle, and event-driven delivery
//! of caller-ID payloads from the native boundary.
//!
//! # Modules
//!
//! - `bridge`: native boundary trait plus serial and mock implementations
//! - `catalog`: port catalog accessor and snapshot
//! - `config`: configuration with TOML support
//! - `error`: session-level error taxonomy
//! - `events`: caller event types and the UI-facing event bridge
//! - `session`: the session manager state machine
//! - `state`: session state snapshot types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use callerid_bridge::{Config, EventBridge, NativePortBridge, SerialBridge, SessionManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let bridge = Arc::new(SerialBridge::new(config.serial, config.events.buffer));
//!
//! let events = EventBridge::new(bridge.subscribe());
//! events.on_caller_id(|number| println!("incoming call: {number}"));
//!
//! let manager = SessionManager::new(bridge);
//! let ports = manager.refresh_ports().await?;
//! manager.connect(&ports[0]).await?;
//! manager.start_listening().await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use bridge::{BridgeError, MockBridge, NativePortBridge, SerialBridge};
pub use catalog::PortCatalog;
pub use config::{Config, ConfigError, ConfigResult, EventsConfig, LoggingConfig, SerialConfig};
pub use error::{SessionError, SessionResult};
pub use events::{CallerEvent, EventBridge};
pub use session::SessionManager;
pub use state::{SessionPhase, SessionStatus};
