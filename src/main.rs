//! `stopwatch-bridge` command-line entry point.
//!
//! ```text
//! stopwatch-bridge                          # auto-discover, wait for device
//! stopwatch-bridge -p /dev/ttyACM0 --trigger go
//! stopwatch-bridge -p COM11 -p COM3 --addr 0.0.0.0:5000 --debug
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stopwatch_bridge::config::{DEFAULT_BAUD_RATE, DEFAULT_HTTP_ADDR};
use stopwatch_bridge::{Bridge, BridgeConfig, Error, Result, TriggerMode};

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "stopwatch-bridge", version, about)]
struct Args {
    /// Serial endpoint to try, in order. Repeatable. Omit to auto-discover.
    #[arg(short = 'p', long = "port", value_name = "ENDPOINT")]
    ports: Vec<String>,

    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Serial read timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// HTTP listen address.
    #[arg(long, default_value_t = DEFAULT_HTTP_ADDR)]
    addr: SocketAddr,

    /// How each cycle starts: device, go or prompt.
    #[arg(long, default_value_t = TriggerMode::Device)]
    trigger: TriggerMode,

    /// Heartbeat period in milliseconds.
    #[arg(long, default_value_t = 1000)]
    heartbeat_ms: u64,

    /// Enable debug logging.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

impl Args {
    fn into_config(self) -> Result<BridgeConfig> {
        BridgeConfig::builder()
            .endpoints(self.ports)
            .baud_rate(self.baud)
            .read_timeout(Duration::from_millis(self.timeout_ms))
            .http_addr(self.addr)
            .trigger(self.trigger)
            .heartbeat(Duration::from_millis(self.heartbeat_ms))
            .build()
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging. `RUST_LOG` takes precedence over `--debug`.
fn init_logging(debug: bool) {
    let fallback = if debug {
        "stopwatch_bridge=debug"
    } else {
        "stopwatch_bridge=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    let bridge = Bridge::new(config);
    info!(
        addr = %bridge.config().http_addr,
        trigger = %bridge.config().trigger,
        "Starting stopwatch bridge"
    );

    let shutdown = bridge.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            shutdown.trigger();
        }
    });

    bridge.run().await?;
    Ok(())
}

/// Operator hint logged next to a failure, if one applies.
fn failure_hint(error: &Error) -> Option<&'static str> {
    if error.is_transport_error() {
        Some("check that the timing device is plugged in and not held by another program")
    } else if matches!(error, Error::Config { .. }) {
        Some("see --help for valid arguments")
    } else {
        None
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match failure_hint(&e) {
                Some(hint) => error!(error = %e, fatal = e.is_fatal(), hint, "Bridge failed"),
                None => error!(error = %e, fatal = e.is_fatal(), "Bridge failed"),
            }
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
