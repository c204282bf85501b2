//! Line-oriented serial connection.
//!
//! This module turns a raw byte stream into newline-framed text lines
//! and provides connection establishment with retry over endpoints.
//!
//! # Framing
//!
//! Bytes are buffered until `\n`. A read timeout leaves any partial line
//! in the buffer so the next call can complete it. Lines that are not
//! valid UTF-8, or that grow past [`MAX_LINE_BYTES`] without a newline,
//! are dropped.

// ============================================================================
// Imports
// ============================================================================

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, trace, warn};

use crate::config::{BridgeConfig, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};

use super::discovery::EndpointDescriptor;

// ============================================================================
// Constants
// ============================================================================

/// Longest line accepted before the buffer is discarded.
pub const MAX_LINE_BYTES: usize = 256;

/// Size of a single read from the stream.
const READ_CHUNK: usize = 64;

// ============================================================================
// LineTransport
// ============================================================================

/// Line source and byte sink used by the protocol driver.
///
/// Neither method reports errors to the caller: a failed read is "no
/// line this time" and a failed write is logged and returned as `false`.
pub trait LineTransport: Send {
    /// Reads one line without its terminator.
    ///
    /// Blocks for at most the configured timeout. Returns `None` on
    /// timeout, decode failure or a broken stream.
    fn read_line(&mut self) -> Option<String>;

    /// Writes raw bytes, best effort.
    ///
    /// Returns `true` if all bytes were written and flushed.
    fn write_bytes(&mut self, bytes: &[u8]) -> bool;
}

// ============================================================================
// SerialOptions
// ============================================================================

/// Serial port settings.
///
/// The link is always 8 data bits, no parity, 1 stop bit, no flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialOptions {
    /// Baud rate.
    pub baud_rate: u32,
    /// Read and write timeout.
    pub timeout: Duration,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl From<&BridgeConfig> for SerialOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            baud_rate: config.baud_rate,
            timeout: config.timeout,
        }
    }
}

// ============================================================================
// LineConnection
// ============================================================================

/// Newline-framed connection over any byte stream.
pub struct LineConnection<S> {
    /// Endpoint id for logging.
    endpoint: String,
    /// Underlying byte stream.
    stream: S,
    /// Bytes received but not yet returned as a line.
    pending: Vec<u8>,
    /// Pause after EOF or a hard read error, to avoid spinning on a
    /// disconnected device.
    idle_backoff: Duration,
}

/// Connection over an OS serial port.
pub type SerialConnection = LineConnection<Box<dyn SerialPort>>;

impl<S> LineConnection<S> {
    /// Wraps a byte stream.
    ///
    /// `idle_backoff` is slept after EOF or a hard read error; pass the
    /// read timeout for real ports and [`Duration::ZERO`] in tests.
    pub fn new(endpoint: impl Into<String>, stream: S, idle_backoff: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            stream,
            pending: Vec::with_capacity(MAX_LINE_BYTES),
            idle_backoff,
        }
    }

    /// Number of buffered bytes not yet returned as a line.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pops one complete line off the buffer, if there is one.
    fn take_buffered_line(&mut self) -> Option<Option<String>> {
        let newline = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=newline).collect();

        match String::from_utf8(raw) {
            Ok(text) => Some(Some(text.trim().to_string())),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Dropping undecodable line");
                Some(None)
            }
        }
    }

    fn back_off(&self) {
        if !self.idle_backoff.is_zero() {
            std::thread::sleep(self.idle_backoff);
        }
    }
}

impl<S: Read + Write + Send> LineTransport for LineConnection<S> {
    fn read_line(&mut self) -> Option<String> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.take_buffered_line() {
                if let Some(ref text) = line {
                    trace!(endpoint = %self.endpoint, line = %text, "Line received");
                }
                return line;
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    debug!(endpoint = %self.endpoint, "Serial stream at EOF");
                    self.back_off();
                    return None;
                }
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    if self.pending.len() > MAX_LINE_BYTES && !self.pending.contains(&b'\n') {
                        warn!(
                            endpoint = %self.endpoint,
                            len = self.pending.len(),
                            max = MAX_LINE_BYTES,
                            "Line too long, discarding buffer"
                        );
                        self.pending.clear();
                        return None;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return None;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "Serial read failed");
                    self.back_off();
                    return None;
                }
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        let result = self
            .stream
            .write_all(bytes)
            .and_then(|()| self.stream.flush());

        match result {
            Ok(()) => {
                debug!(endpoint = %self.endpoint, len = bytes.len(), "Bytes written");
                true
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Serial write failed");
                false
            }
        }
    }
}

// ============================================================================
// Connect
// ============================================================================

/// Opens one serial endpoint.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the port cannot be opened.
pub fn connect(endpoint: &EndpointDescriptor, options: &SerialOptions) -> Result<SerialConnection> {
    let port = serialport::new(&endpoint.id, options.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(options.timeout)
        .open()
        .map_err(|e| Error::connection(&endpoint.id, e.to_string()))?;

    Ok(LineConnection::new(&endpoint.id, port, options.timeout))
}

/// Opens the first serial endpoint that accepts, in order.
///
/// # Errors
///
/// - [`Error::NoEndpoints`] if `endpoints` is empty
/// - [`Error::ConnectionsExhausted`] if every endpoint failed
pub fn connect_any(
    endpoints: &[EndpointDescriptor],
    options: &SerialOptions,
) -> Result<(SerialConnection, EndpointDescriptor)> {
    connect_first(endpoints, |endpoint| connect(endpoint, options))
}

/// Tries `open` on each endpoint in order and returns the first success.
///
/// Each attempt is one call; failures are logged and the next endpoint
/// is tried. The iteration is bounded by `endpoints.len()`.
///
/// # Errors
///
/// - [`Error::NoEndpoints`] if `endpoints` is empty
/// - [`Error::ConnectionsExhausted`] if every attempt failed
pub fn connect_first<C, F>(
    endpoints: &[EndpointDescriptor],
    mut open: F,
) -> Result<(C, EndpointDescriptor)>
where
    F: FnMut(&EndpointDescriptor) -> Result<C>,
{
    if endpoints.is_empty() {
        return Err(Error::NoEndpoints);
    }

    for endpoint in endpoints {
        match open(endpoint) {
            Ok(connection) => {
                info!(endpoint = %endpoint.id, "Connected to timing device");
                return Ok((connection, endpoint.clone()));
            }
            Err(e) => {
                warn!(endpoint = %endpoint.id, error = %e, "Endpoint failed, trying next");
            }
        }
    }

    Err(Error::connections_exhausted(endpoints.len()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::io;

    /// Stream that replays scripted read results and records writes.
    struct ScriptedStream {
        reads: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<u8>,
        fail_writes: bool,
    }

    impl ScriptedStream {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
                written: Vec::new(),
                fail_writes: false,
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.reads.push_front(Ok(bytes[n..].to_vec()));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn connection(reads: Vec<io::Result<Vec<u8>>>) -> LineConnection<ScriptedStream> {
        LineConnection::new("test", ScriptedStream::new(reads), Duration::ZERO)
    }

    fn timeout() -> io::Result<Vec<u8>> {
        Err(io::Error::new(ErrorKind::TimedOut, "timed out"))
    }

    #[test]
    fn test_reads_crlf_line() {
        let mut conn = connection(vec![Ok(b"START 1000\r\n".to_vec())]);
        assert_eq!(conn.read_line().as_deref(), Some("START 1000"));
    }

    #[test]
    fn test_two_lines_in_one_chunk() {
        let mut conn = connection(vec![Ok(b"START 1\nSTOP 2\n".to_vec())]);
        assert_eq!(conn.read_line().as_deref(), Some("START 1"));
        assert_eq!(conn.read_line().as_deref(), Some("STOP 2"));
        assert_eq!(conn.read_line(), None);
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let mut conn = connection(vec![Ok(b"STO".to_vec()), timeout(), Ok(b"P 4530\n".to_vec())]);

        assert_eq!(conn.read_line(), None);
        assert_eq!(conn.pending_len(), 3);
        assert_eq!(conn.read_line().as_deref(), Some("STOP 4530"));
        assert_eq!(conn.pending_len(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_dropped() {
        let mut conn = connection(vec![Ok(vec![0xff, 0xfe, b'\n', b'S', b'T', b'O', b'P', b' ', b'1', b'\n'])]);
        assert_eq!(conn.read_line(), None);
        assert_eq!(conn.read_line().as_deref(), Some("STOP 1"));
    }

    #[test]
    fn test_overlong_line_is_discarded() {
        let garbage = vec![b'x'; MAX_LINE_BYTES + 10];
        let mut conn = connection(vec![Ok(garbage), Ok(b"START 5\n".to_vec())]);

        let mut result = conn.read_line();
        while result.is_none() && conn.pending_len() > 0 {
            result = conn.read_line();
        }
        assert_eq!(conn.read_line().as_deref(), Some("START 5"));
    }

    #[test]
    fn test_eof_and_hard_error_yield_none() {
        let mut conn = connection(vec![
            Ok(Vec::new()),
            Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged")),
        ]);
        assert_eq!(conn.read_line(), None);
        assert_eq!(conn.read_line(), None);
    }

    #[test]
    fn test_write_bytes() {
        let mut conn = connection(Vec::new());
        assert!(conn.write_bytes(b"GO"));
        assert_eq!(conn.stream.written, b"GO");
    }

    #[test]
    fn test_write_failure_returns_false() {
        let mut conn = connection(Vec::new());
        conn.stream.fail_writes = true;
        assert!(!conn.write_bytes(b"GO"));
    }

    #[test]
    fn test_connect_first_empty_is_no_endpoints() {
        let result = connect_first::<(), _>(&[], |_| Ok(()));
        assert!(matches!(result, Err(Error::NoEndpoints)));
    }

    #[test]
    fn test_connect_first_falls_through_to_next() {
        let endpoints = vec![
            EndpointDescriptor::configured("COM3"),
            EndpointDescriptor::configured("COM11"),
        ];
        let mut tried = Vec::new();

        let (conn, endpoint) = connect_first(&endpoints, |e| {
            tried.push(e.id.clone());
            if e.id == "COM3" {
                Err(Error::connection(&e.id, "busy"))
            } else {
                Ok(e.id.len())
            }
        })
        .expect("second endpoint opens");

        assert_eq!(tried, vec!["COM3", "COM11"]);
        assert_eq!(endpoint.id, "COM11");
        assert_eq!(conn, 5);
    }

    #[test]
    fn test_connect_first_exhausted() {
        let endpoints = vec![
            EndpointDescriptor::configured("COM3"),
            EndpointDescriptor::configured("COM4"),
        ];
        let mut attempts = 0;

        let result = connect_first::<(), _>(&endpoints, |e| {
            attempts += 1;
            Err(Error::connection(&e.id, "busy"))
        });

        assert_eq!(attempts, 2);
        assert!(matches!(
            result,
            Err(Error::ConnectionsExhausted { attempts: 2 })
        ));
    }

    #[test]
    fn test_connect_missing_port_fails() {
        let endpoint = EndpointDescriptor::configured("/dev/does-not-exist-stopwatch");
        let result = connect(&endpoint, &SerialOptions::default());
        assert!(matches!(result, Err(Error::Connection { .. })));
    }

    #[test]
    fn test_serial_options_from_config() {
        let config = BridgeConfig::builder()
            .baud_rate(115_200)
            .read_timeout(Duration::from_millis(250))
            .build()
            .expect("valid");
        let options = SerialOptions::from(&config);
        assert_eq!(options.baud_rate, 115_200);
        assert_eq!(options.timeout, Duration::from_millis(250));
    }
}
