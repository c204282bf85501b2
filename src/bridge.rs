//! Bridge coordinator.
//!
//! The [`Bridge`] wires the three concurrent units around one shared
//! session and owns their lifecycle:
//!
//! | Unit | Runs on | Touches session |
//! |------|---------|-----------------|
//! | Protocol driver | dedicated OS thread (blocking reads) | transitions |
//! | Heartbeat | tokio task | `+= period` while running |
//! | HTTP status service | tokio tasks per request | reads |
//!
//! The units never call each other; they only share the
//! [`SessionHandle`]. Shutdown is one [`Shutdown`] signal seen by all.
//!
//! # Example
//!
//! ```no_run
//! use stopwatch_bridge::{Bridge, BridgeConfig};
//!
//! # async fn example() -> stopwatch_bridge::Result<()> {
//! let config = BridgeConfig::builder().endpoint("/dev/ttyACM0").build()?;
//! let bridge = Bridge::new(config);
//!
//! let shutdown = bridge.shutdown_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     shutdown.trigger();
//! });
//!
//! bridge.run().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io;
use std::thread;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{BridgeConfig, TriggerMode};
use crate::driver::{ExitReason, FixedTrigger, PromptTrigger, ProtocolDriver, Trigger};
use crate::error::{Error, Result};
use crate::server;
use crate::session::{Heartbeat, SessionHandle};
use crate::shutdown::Shutdown;
use crate::transport::{LineTransport, SerialOptions, connect_any, discover_endpoints};

// ============================================================================
// Constants
// ============================================================================

/// Extra time, beyond one read timeout, the driver gets to notice shutdown.
const DRIVER_JOIN_GRACE: Duration = Duration::from_secs(1);

// ============================================================================
// Bridge
// ============================================================================

/// Serial-to-HTTP stopwatch bridge.
pub struct Bridge {
    config: BridgeConfig,
    session: SessionHandle,
    shutdown: Shutdown,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("status", &self.session.status())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Creates a bridge with a fresh idle session.
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            session: SessionHandle::new(),
            shutdown: Shutdown::new(),
        }
    }

    /// Returns the bridge configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns a handle to the shared session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    /// Returns a handle that stops [`Bridge::run`] when triggered.
    #[inline]
    #[must_use]
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Discovers and opens the device, binds HTTP, and runs until shutdown.
    ///
    /// # Errors
    ///
    /// - [`Error::NoEndpoints`] if no serial endpoint is found
    /// - [`Error::ConnectionsExhausted`] if none of them opens
    /// - [`Error::Io`] if the HTTP address cannot be bound or the server fails
    pub async fn run(self) -> Result<ExitReason> {
        if self.config.auto_discover() {
            info!("No serial endpoint configured, scanning ports");
        }
        let endpoints = discover_endpoints(&self.config.endpoints)?;
        let options = SerialOptions::from(&self.config);
        let (transport, endpoint) = connect_any(&endpoints, &options)?;

        info!(
            endpoint = %endpoint,
            baud = options.baud_rate,
            timeout_ms = whole_millis(options.timeout),
            "Serial link open"
        );

        let listener = TcpListener::bind(self.config.http_addr).await?;
        let trigger = trigger_for(self.config.trigger);

        self.run_with(transport, trigger, listener).await
    }

    /// Runs the bridge over an already-open transport and listener.
    ///
    /// Returns when the shutdown handle is triggered, the trigger quits,
    /// or the HTTP server fails.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the driver thread cannot be spawned or the
    ///   HTTP server fails
    pub async fn run_with<T, G>(
        self,
        transport: T,
        trigger: G,
        listener: TcpListener,
    ) -> Result<ExitReason>
    where
        T: LineTransport + 'static,
        G: Trigger + 'static,
    {
        let Self {
            config,
            session,
            shutdown,
        } = self;

        let heartbeat = Heartbeat::new(session.clone(), config.heartbeat).spawn(shutdown.clone());

        let mut server = tokio::spawn(server::serve(
            listener,
            session.clone(),
            config.heartbeat,
            shutdown.clone(),
        ));

        let (done_tx, mut done_rx) = oneshot::channel();
        {
            let shutdown = shutdown.clone();
            let session = session.clone();
            thread::Builder::new()
                .name("protocol-driver".to_string())
                .spawn(move || {
                    let mut driver = ProtocolDriver::new(transport, trigger, session);
                    let _ = done_tx.send(driver.run(&shutdown));
                })?;
        }

        let mut server_result = None;
        let driver_exit = tokio::select! {
            exit = &mut done_rx => Some(exit.unwrap_or(ExitReason::Shutdown)),
            joined = &mut server => {
                server_result = Some(joined);
                None
            }
            () = shutdown.wait() => None,
        };

        shutdown.trigger();
        debug!("Bridge shutting down");

        let reason = match driver_exit {
            Some(reason) => reason,
            None => match timeout(config.timeout + DRIVER_JOIN_GRACE, done_rx).await {
                Ok(exit) => exit.unwrap_or(ExitReason::Shutdown),
                Err(_) => {
                    warn!("Protocol driver still blocked, leaving it behind");
                    ExitReason::Shutdown
                }
            },
        };

        if let Err(e) = heartbeat.await {
            warn!(error = %e, "Heartbeat task failed");
        }

        let server_result = match server_result {
            Some(joined) => joined,
            None => server.await,
        };
        server_result.map_err(|e| Error::Io(io::Error::other(e)))??;

        info!(?reason, "Bridge stopped");
        Ok(reason)
    }
}

/// Milliseconds in `duration`, saturating at `u64::MAX`.
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Builds the per-cycle trigger for `mode`.
fn trigger_for(mode: TriggerMode) -> Box<dyn Trigger> {
    match mode {
        TriggerMode::Prompt => Box::new(PromptTrigger::stdio()),
        TriggerMode::Device | TriggerMode::Go => Box::new(FixedTrigger::from(mode)),
    }
}

// ============================================================================
// Tests
// ============================================================================
