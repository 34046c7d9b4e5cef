//! Protocol session with one charger
//!
//! A [`ChargerSession`] owns the socket, the frame sequence counter and the
//! last good status. All operations block the calling thread and exactly one
//! read or write is in flight at a time; callers that share a session across
//! threads must serialize access themselves (for example behind a mutex).
//!
//! Lifecycle: `Disconnected -> Ready -> Disconnected`. The sequence counter
//! starts at 2, advances after the handshake and after every command, and is
//! never reset, not even across reconnects.

pub mod commands;
pub mod monitor;
pub mod transport;

use crate::config::Config;
use crate::envelope::{FrameContent, NoStatusReason, unwrap_frame};
use crate::error::{ChargerError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::status::ChargerStatus;
use std::thread::sleep;
use std::time::Duration;

pub use commands::Command;
pub use monitor::{MonitorOptions, MonitorSummary};
pub use transport::{Connector, TcpConnector, TcpTransport, Transport};

/// Initial value of the frame sequence counter
pub const INITIAL_SEQUENCE: u64 = 2;

/// Read attempts used by [`ChargerSession::poll_status`]
pub const DEFAULT_RETRIES: u32 = 3;

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Ready,
}

/// Settle delays and read deadlines used by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Pause between the announcement frame and the drain read
    pub handshake_pause: Duration,
    /// Deadline of the best-effort drain read
    pub handshake_drain: Duration,
    /// Settle delay after the identification frame
    pub handshake_settle: Duration,
    /// Deadline of one status read
    pub read_timeout: Duration,
    /// Settle delay after every command
    pub command_settle: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            handshake_pause: Duration::from_millis(100),
            handshake_drain: Duration::from_secs(1),
            handshake_settle: Duration::from_millis(200),
            read_timeout: Duration::from_secs(2),
            command_settle: Duration::from_millis(500),
        }
    }
}

impl SessionTiming {
    /// No settle delays; reads still use the default deadlines
    pub fn without_delays() -> Self {
        Self {
            handshake_pause: Duration::ZERO,
            handshake_settle: Duration::ZERO,
            command_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl From<&crate::config::TimingConfig> for SessionTiming {
    fn from(t: &crate::config::TimingConfig) -> Self {
        Self {
            handshake_pause: Duration::from_millis(t.handshake_pause_ms),
            handshake_drain: Duration::from_millis(t.handshake_drain_ms),
            handshake_settle: Duration::from_millis(t.handshake_settle_ms),
            read_timeout: Duration::from_millis(t.read_timeout_ms),
            command_settle: Duration::from_millis(t.command_settle_ms),
        }
    }
}

/// Direct session with one charger
pub struct ChargerSession<C: Connector = TcpConnector> {
    host: String,
    port: u16,
    device_id: String,
    connect_timeout: Duration,
    timing: SessionTiming,
    connector: C,
    transport: Option<C::Transport>,
    sequence: u64,
    last_good_status: Option<ChargerStatus>,
    cached_max_current: Option<u32>,
    logger: StructuredLogger,
}

impl ChargerSession<TcpConnector> {
    /// Create a TCP session with default timing
    pub fn new(host: &str, port: u16, device_id: &str) -> Self {
        Self::with_connector(host, port, device_id, TcpConnector)
    }

    /// Create a TCP session from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.charger.host,
            config.charger.port,
            &config.charger.device_id,
        )
        .with_connect_timeout(config.charger.timeout())
        .with_timing(SessionTiming::from(&config.timing))
    }
}

impl<C: Connector> ChargerSession<C> {
    /// Create a session over a custom connector
    pub fn with_connector(host: &str, port: u16, device_id: &str, connector: C) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("session")
                .with_device_id(device_id)
                .with_field("peer", format!("{}:{}", host, port)),
        );
        Self {
            host: host.to_string(),
            port,
            device_id: device_id.to_string(),
            connect_timeout: Duration::from_secs(5),
            timing: SessionTiming::default(),
            connector,
            transport: None,
            sequence: INITIAL_SEQUENCE,
            last_good_status: None,
            cached_max_current: None,
            logger,
        }
    }

    pub fn with_timing(mut self, timing: SessionTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn timing(&self) -> &SessionTiming {
        &self.timing
    }

    /// Current value of the frame sequence counter
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn state(&self) -> SessionState {
        if self.transport.is_some() {
            SessionState::Ready
        } else {
            SessionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Last status decoded by this session, if any
    pub fn cached_status(&self) -> Option<&ChargerStatus> {
        self.last_good_status.as_ref()
    }

    /// Open the socket and perform the handshake; `false` on any failure
    pub fn connect(&mut self) -> bool {
        match self.try_connect() {
            Ok(()) => true,
            Err(e) => {
                self.logger.error(&format!("Connection failed: {}", e));
                false
            }
        }
    }

    /// Open the socket and perform the handshake.
    ///
    /// On failure the socket is closed again and the session stays
    /// disconnected. No internal retry.
    pub fn try_connect(&mut self) -> Result<()> {
        self.close_transport();

        self.logger.info(&format!(
            "Connecting to charger at {}:{}",
            self.host, self.port
        ));
        let transport = self
            .connector
            .open(&self.host, self.port, self.connect_timeout)?;
        self.transport = Some(transport);

        if let Err(e) = self.handshake() {
            self.close_transport();
            return Err(e);
        }

        self.sequence += 1;
        self.logger.info("Connected and handshake sent");
        Ok(())
    }

    /// Close the socket; safe to call when already disconnected
    pub fn disconnect(&mut self) {
        if self.close_transport() {
            self.logger.info("Disconnected");
        }
    }

    fn close_transport(&mut self) -> bool {
        match self.transport.take() {
            Some(mut transport) => {
                transport.close();
                true
            }
            None => false,
        }
    }

    fn handshake(&mut self) -> Result<()> {
        self.send_raw(&commands::announce_frame())?;
        pause(self.timing.handshake_pause);

        // The reply to the announcement carries nothing we need
        match self.recv_raw(self.timing.handshake_drain) {
            Ok(reply) => self
                .logger
                .trace(&format!("Handshake reply discarded: {}", hex::encode(&reply))),
            Err(e) => self
                .logger
                .debug(&format!("Handshake drain read ignored: {}", e)),
        }

        self.send_raw(&commands::identify_frame(&self.device_id))?;
        pause(self.timing.handshake_settle);
        Ok(())
    }

    /// Poll with the default attempt count and cache fallback
    pub fn poll_status(&mut self) -> Result<Option<ChargerStatus>> {
        self.get_status(DEFAULT_RETRIES, true)
    }

    /// Read status frames until one carries a status.
    ///
    /// Each attempt is a single bounded read. A decoded status is cached and
    /// returned at once; a keepalive consumes the attempt. When the final
    /// attempt fails, the cached status is returned if `use_cache` allows and
    /// one exists, otherwise the error propagates. Running out of attempts
    /// without error or status yields the cache (if allowed) or `None`.
    pub fn get_status(&mut self, retries: u32, use_cache: bool) -> Result<Option<ChargerStatus>> {
        for attempt in 1..=retries {
            match self.read_status_once() {
                Ok(Some(status)) => {
                    self.last_good_status = Some(status.clone());
                    return Ok(Some(status));
                }
                Ok(None) => {}
                Err(e) if attempt == retries => {
                    if use_cache && let Some(cached) = self.last_good_status.as_ref() {
                        self.logger.warn(&format!(
                            "Status read failed after {} attempts, using cached status: {}",
                            retries, e
                        ));
                        return Ok(Some(cached.clone()));
                    }
                    return Err(e);
                }
                Err(e) => self.logger.warn(&format!(
                    "Status read attempt {}/{} failed: {}",
                    attempt, retries, e
                )),
            }
        }

        if use_cache {
            Ok(self.last_good_status.clone())
        } else {
            Ok(None)
        }
    }

    fn read_status_once(&mut self) -> Result<Option<ChargerStatus>> {
        let frame = self.recv_raw(self.timing.read_timeout)?;
        self.logger
            .trace(&format!("Received {} bytes: {}", frame.len(), hex::encode(&frame)));

        match unwrap_frame(&frame, &self.device_id)? {
            FrameContent::Status(status_frame) => {
                if let Some(message_type) = status_frame.message_type.as_deref() {
                    self.logger
                        .debug(&format!("Status payload from {}", message_type));
                }
                Ok(Some(ChargerStatus::from_frame(
                    &status_frame,
                    self.cached_max_current,
                )))
            }
            FrameContent::NoStatus(NoStatusReason::ContinueRequest) => {
                self.logger.debug("Continue request, no status in frame");
                Ok(None)
            }
            FrameContent::NoStatus(NoStatusReason::NoKeyFields) => {
                self.logger.debug("Keepalive frame without status fields");
                Ok(None)
            }
        }
    }

    /// Send one framed command, then advance the sequence and let the
    /// firmware settle
    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        let frame = command.frame(&self.device_id, self.sequence);
        self.logger.debug(&format!(
            "Sending {} (sequence {})",
            command.describe(),
            self.sequence
        ));
        self.send_raw(&frame)?;
        self.sequence += 1;
        pause(self.timing.command_settle);
        Ok(())
    }

    fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| ChargerError::connection("Not connected"))?;
        self.logger.trace(&format!("Sending frame: {}", hex::encode(frame)));
        transport.send(frame)
    }

    fn recv_raw(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| ChargerError::connection("Not connected"))?;
        transport.recv(timeout)
    }
}

impl<C: Connector> Drop for ChargerSession<C> {
    fn drop(&mut self) {
        self.close_transport();
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay);
    }
}
