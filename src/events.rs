//! Caller-ID event types and the UI-facing event bridge.
//!
//! The native boundary pushes events at any time, unordered relative to
//! command responses. [`EventBridge`] subscribes to that stream and forwards
//! each event to the handler registered for its type. Registration is
//! single-consumer: re-registering replaces the previous handler. There is no
//! buffering or replay, so a handler registered after an event fired will
//! never see that event.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// An asynchronous event raised by the native boundary.
///
/// Delivered at most once per physical event, in the order the boundary
/// raised them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CallerEvent {
    /// An incoming caller-ID record (the caller's number as reported by the
    /// modem, e.g. `+905551234567`).
    Received(String),
    /// The listener hit an error; the payload is the native message.
    Error(String),
}

/// Handler invoked with the payload of a caller event.
///
/// Handlers run on the bridge's pump task and must not block.
pub type EventHandler = Arc<dyn Fn(String) + Send + Sync + 'static>;

type HandlerSlot = Arc<Mutex<Option<EventHandler>>>;

/// Forwards native boundary events to registered handlers.
///
/// One active handler per event type; last registration wins. Dropping the
/// bridge stops the pump task and detaches both handlers.
pub struct EventBridge {
    caller_id: HandlerSlot,
    error: HandlerSlot,
    pump: JoinHandle<()>,
}

impl EventBridge {
    /// Start a bridge pumping from the given event subscription.
    ///
    /// Events arriving while no handler is registered for their type are
    /// dropped, matching the no-replay contract.
    pub fn new(mut events: broadcast::Receiver<CallerEvent>) -> Self {
        let caller_id: HandlerSlot = Arc::new(Mutex::new(None));
        let error: HandlerSlot = Arc::new(Mutex::new(None));

        let caller_id_slot = Arc::clone(&caller_id);
        let error_slot = Arc::clone(&error);
        let pump = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    // The handler is cloned out and the slot guard released
                    // before invocation, so a handler may re-register without
                    // blocking the pump.
                    Ok(CallerEvent::Received(payload)) => {
                        let handler = caller_id_slot.lock().clone();
                        match handler {
                            Some(handler) => handler(payload),
                            None => trace!(%payload, "caller-id event dropped, no handler"),
                        }
                    }
                    Ok(CallerEvent::Error(message)) => {
                        let handler = error_slot.lock().clone();
                        match handler {
                            Some(handler) => handler(message),
                            None => trace!(%message, "caller-id error dropped, no handler"),
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event stream lagged, events lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            caller_id,
            error,
            pump,
        }
    }

    /// Register the caller-ID handler, replacing any previous one.
    ///
    /// Safe to call from inside a running handler (e.g. a handler swapping
    /// in a one-shot follow-up).
    pub fn on_caller_id(&self, handler: impl Fn(String) + Send + Sync + 'static) {
        *self.caller_id.lock() = Some(Arc::new(handler));
    }

    /// Register the error handler, replacing any previous one.
    pub fn on_error(&self, handler: impl Fn(String) + Send + Sync + 'static) {
        *self.error.lock() = Some(Arc::new(handler));
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("caller_id_registered", &self.caller_id.lock().is_some())
            .field("error_registered", &self.error.lock().is_some())
            .finish()
    }
}
