//! Real serial-port implementation of the native boundary.
//!
//! Talks to a caller-ID capable modem through the `serialport` crate.
//! Blocking port I/O is moved off the async runtime with
//! `tokio::task::spawn_blocking`; the listener runs as a blocking reader
//! task gated by an atomic flag and publishes parsed caller-ID lines on the
//! broadcast event stream.

use super::error::BridgeError;
use super::traits::NativePortBridge;
use crate::config::SerialConfig;
use crate::events::CallerEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// `serialport`-backed caller-ID modem boundary.
///
/// Holds at most one open port. Cloning shares the same underlying
/// connection and event stream.
#[derive(Clone)]
pub struct SerialBridge {
    config: SerialConfig,
    port: Arc<Mutex<Option<Box<dyn serialport::SerialPort>>>>,
    listening: Arc<AtomicBool>,
    events: broadcast::Sender<CallerEvent>,
}

impl SerialBridge {
    pub fn new(config: SerialConfig, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            config,
            port: Arc::new(Mutex::new(None)),
            listening: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    fn clone_port(&self) -> Result<Box<dyn serialport::SerialPort>, BridgeError> {
        let guard = self.port.lock();
        let port = guard
            .as_ref()
            .ok_or_else(|| BridgeError::command("no port connected"))?;
        port.try_clone().map_err(|e| BridgeError::command(e.to_string()))
    }
}

#[async_trait]
impl NativePortBridge for SerialBridge {
    async fn list_com_ports(&self) -> Result<Vec<String>, BridgeError> {
        let ports = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(|e| BridgeError::unavailable(e.to_string()))?
            .map_err(|e| BridgeError::unavailable(e.to_string()))?;
        // Enumeration order is preserved as reported by the OS.
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    async fn connect_com_port(&self, port_name: &str) -> Result<(), BridgeError> {
        if self.port.lock().is_some() {
            return Err(BridgeError::command("a port is already connected"));
        }

        let name = port_name.to_string();
        let baud = self.config.baud_rate;
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let opened = tokio::task::spawn_blocking(move || {
            serialport::new(&name, baud).timeout(timeout).open()
        })
        .await
        .map_err(|e| BridgeError::unavailable(e.to_string()))?
        .map_err(|e| BridgeError::command(e.to_string()))?;

        *self.port.lock() = Some(opened);
        info!(port = %port_name, baud, "serial port opened");
        Ok(())
    }

    async fn disconnect_com_port(&self) -> Result<(), BridgeError> {
        self.listening.store(false, Ordering::SeqCst);
        let had_port = self.port.lock().take().is_some();
        if had_port {
            info!("serial port closed");
            Ok(())
        } else {
            Err(BridgeError::command("no port connected"))
        }
    }

    async fn start_caller_id_listening(&self) -> Result<(), BridgeError> {
        if self.listening.load(Ordering::SeqCst) {
            return Ok(());
        }
        let mut init_port = self.clone_port()?;
        let reader_port = self.clone_port()?;

        let init_command = format!("{}\r", self.config.init_command);
        tokio::task::spawn_blocking(move || init_port.write_all(init_command.as_bytes()))
            .await
            .map_err(|e| BridgeError::unavailable(e.to_string()))?
            .map_err(BridgeError::Io)?;

        self.listening.store(true, Ordering::SeqCst);
        let listening = Arc::clone(&self.listening);
        let events = self.events.clone();
        tokio::task::spawn_blocking(move || reader_loop(reader_port, listening, events));

        info!("caller-id listener started");
        Ok(())
    }

    async fn stop_caller_id_listening(&self) -> Result<(), BridgeError> {
        // The reader notices the flag on its next timeout tick.
        self.listening.store(false, Ordering::SeqCst);
        info!("caller-id listener stopped");
        Ok(())
    }

    async fn get_connection_status(&self) -> bool {
        self.port.lock().is_some()
    }

    async fn get_listening_status(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<CallerEvent> {
        self.events.subscribe()
    }
}

/// Blocking read loop: accumulates bytes into lines and publishes caller-ID
/// payloads until the listening flag drops or the port dies.
fn reader_loop(
    mut port: Box<dyn serialport::SerialPort>,
    listening: Arc<AtomicBool>,
    events: broadcast::Sender<CallerEvent>,
) {
    let mut buf = [0u8; 256];
    let mut line: Vec<u8> = Vec::new();

    while listening.load(Ordering::SeqCst) {
        match std::io::Read::read(&mut port, &mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                for &byte in &buf[..n] {
                    if byte == b'\r' || byte == b'\n' {
                        if !line.is_empty() {
                            let text = String::from_utf8_lossy(&line).to_string();
                            line.clear();
                            debug!(line = %text, "modem line");
                            if let Some(number) = parse_caller_id(&text) {
                                let _ = events.send(CallerEvent::Received(number));
                            }
                        }
                    } else {
                        line.push(byte);
                    }
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue
            }
            Err(e) => {
                warn!(error = %e, "caller-id reader failed");
                let _ = events.send(CallerEvent::Error(e.to_string()));
                listening.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
}

/// Extract the caller's number from a modem caller-ID line.
///
/// Modems report incoming calls as `NMBR = 5551234567` (format varies in
/// spacing and separator). Other lines (`RING`, `DATE`, `TIME`, `NAME`) are
/// not forwarded.
fn parse_caller_id(line: &str) -> Option<String> {
    let rest = line.trim().strip_prefix("NMBR")?;
    let number = rest.trim_start_matches([' ', '=', ':']).trim();
    if number.is_empty() {
        None
    } else {
        Some(number.to_string())
    }
}

impl std::fmt::Debug for SerialBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialBridge")
            .field("connected", &self.port.lock().is_some())
            .field("listening", &self.listening.load(Ordering::SeqCst))
            .finish()
    }
}
