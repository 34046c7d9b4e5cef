//! Byte transport underneath a charger session
//!
//! The session only needs "send one frame" and "read the next segment with a
//! deadline". [`TcpTransport`] does that over a blocking `TcpStream`; tests
//! plug in scripted transports through [`Connector`].

use crate::error::{ChargerError, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Largest segment read in one receive
pub const RECV_BUFFER_SIZE: usize = 4096;

/// A connected, exclusively owned byte stream
pub trait Transport: Send {
    /// Write a whole frame
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Read the next available segment, waiting at most `timeout`.
    ///
    /// No reassembly across segments.
    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Close the stream; safe to call more than once
    fn close(&mut self);
}

/// Opens transports for a session
pub trait Connector {
    type Transport: Transport;

    fn open(&self, host: &str, port: u16, timeout: Duration) -> Result<Self::Transport>;
}

/// Blocking TCP transport
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Connect to `host:port`, trying every resolved address in turn
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| {
                ChargerError::connection(format!("Invalid address {}:{}: {}", host, port, e))
            })?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, non_zero(timeout)) {
                Ok(stream) => {
                    stream
                        .set_write_timeout(Some(non_zero(timeout)))
                        .and_then(|()| stream.set_nodelay(true))
                        .map_err(|e| map_io_error("connect", e))?;
                    return Ok(Self { stream, peer: addr });
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(e) => map_io_error("connect", e),
            None => ChargerError::connection(format!("No address found for {}:{}", host, port)),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.stream
            .write_all(frame)
            .and_then(|()| self.stream.flush())
            .map_err(|e| map_io_error("send", e))
    }

    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.stream
            .set_read_timeout(Some(non_zero(timeout)))
            .map_err(|e| map_io_error("recv", e))?;

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(ChargerError::connection("Connection closed by charger")),
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) => Err(map_io_error("recv", e)),
        }
    }

    fn close(&mut self) {
        // Already-closed sockets report NotConnected; nothing left to release
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Production connector over TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn open(&self, host: &str, port: u16, timeout: Duration) -> Result<TcpTransport> {
        TcpTransport::connect(host, port, timeout)
    }
}

/// Socket timeouts reject zero durations
fn non_zero(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

/// Map a socket error onto the protocol taxonomy
pub fn map_io_error(operation: &str, err: std::io::Error) -> ChargerError {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            ChargerError::timeout(format!("{} timed out: {}", operation, err))
        }
        _ => ChargerError::connection(format!("{} failed: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_map_io_error_kinds() {
        let timeout = map_io_error("recv", std::io::Error::from(ErrorKind::WouldBlock));
        assert!(matches!(timeout, ChargerError::Timeout { .. }));
        let timeout = map_io_error("recv", std::io::Error::from(ErrorKind::TimedOut));
        assert!(matches!(timeout, ChargerError::Timeout { .. }));
        let reset = map_io_error("send", std::io::Error::from(ErrorKind::ConnectionReset));
        assert!(matches!(reset, ChargerError::Connection { .. }));
    }

    #[test]
    fn test_recv_times_out_without_data() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport =
            TcpTransport::connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        let (_peer, _) = listener.accept().unwrap();

        let err = transport.recv(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ChargerError::Timeout { .. }));
    }

    #[test]
    fn test_recv_reports_closed_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport =
            TcpTransport::connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        let (peer, _) = listener.accept().unwrap();
        drop(peer);

        let err = transport.recv(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ChargerError::Connection { .. }));
    }

    #[test]
    fn test_refused_connection_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TcpTransport::connect("127.0.0.1", port, Duration::from_millis(500)).unwrap_err();
        assert!(matches!(err, ChargerError::Connection { .. }));
    }
}
