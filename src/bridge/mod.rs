//! Native boundary abstraction for the caller-ID serial backend.
//!
//! Provides the [`NativePortBridge`] trait plus the real `serialport`-backed
//! implementation and a scriptable mock for tests.

pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;

pub use error::BridgeError;
pub use mock::MockBridge;
pub use serial::SerialBridge;
pub use traits::NativePortBridge;
