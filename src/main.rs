use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use callerid_bridge::{Config, EventBridge, NativePortBridge, SerialBridge, SessionManager};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Caller-ID serial bridge: discover modem ports and monitor incoming caller-ID events.",
    long_about = "Connects to a caller-ID capable modem over a serial port, enables caller-ID \
reporting, and prints incoming call events. Designed as the native backend for a \
call-center dashboard; also usable standalone from the terminal."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available serial ports.
    Ports,
    /// Connect to a port and print caller-ID events until Ctrl+C.
    Monitor {
        /// Serial port to use (e.g. COM3, /dev/ttyUSB0). Defaults to the
        /// first available port.
        #[arg(short, long)]
        port: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone())),
        )
        .init();

    let bridge = Arc::new(SerialBridge::new(config.serial, config.events.buffer));
    let manager = SessionManager::new(bridge.clone());

    match args.command {
        Command::Ports => {
            let ports = manager.refresh_ports().await?;
            if ports.is_empty() {
                println!("No serial ports found.");
            } else {
                for port in ports {
                    println!("{port}");
                }
            }
        }
        Command::Monitor { port } => {
            let ports = manager.refresh_ports().await?;
            let target = match port.or_else(|| ports.first().cloned()) {
                Some(p) => p,
                None => {
                    error!("no serial ports available");
                    return Err("no serial ports available".into());
                }
            };

            let events = EventBridge::new(bridge.subscribe());
            events.on_caller_id(|number| println!("incoming call: {number}"));
            events.on_error(|message| eprintln!("caller-id error: {message}"));

            manager.connect(&target).await?;
            manager.start_listening().await?;
            info!(port = %target, "monitoring caller-id events, Ctrl+C to stop");

            signal::ctrl_c().await?;
            println!();

            if let Err(e) = manager.stop_listening().await {
                error!(error = %e, "failed to stop listening");
            }
            if let Err(e) = manager.disconnect().await {
                error!(error = %e, "failed to disconnect");
            }
        }
    }

    Ok(())
}
