//! UDP datagram writer (Logstash transport)
//!
//! Sends one datagram per event. There is no fragmentation handling, so
//! payloads larger than the configured limit are rejected.

use crate::core::{LoggerError, Payload, PayloadKind, Result, Writer};
use crate::formatters::logstash::MAX_DATAGRAM_BYTES;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct UdpWriter {
    name: String,
    socket: UdpSocket,
    target: SocketAddr,
    max_bytes: usize,
}

impl UdpWriter {
    /// Resolve `host:port` once and bind a local socket of the same family
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::with_timeout(host, port, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let target = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            LoggerError::config("udp writer", format!("'{}:{}' did not resolve", host, port))
        })?;

        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)?;
        socket.set_write_timeout(Some(timeout))?;

        Ok(Self {
            name: format!("udp:{}", target),
            socket,
            target,
            max_bytes: MAX_DATAGRAM_BYTES,
        })
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Writer for UdpWriter {
    fn write(&self, payload: &Payload) -> Result<()> {
        let datagram = payload.to_text();
        if datagram.len() > self.max_bytes {
            return Err(LoggerError::delivery(
                &self.name,
                format!(
                    "datagram of {} bytes exceeds {} byte limit",
                    datagram.len(),
                    self.max_bytes
                ),
            ));
        }

        let sent = self.socket.send_to(datagram.as_bytes(), self.target)?;
        if sent != datagram.len() {
            return Err(LoggerError::delivery(
                &self.name,
                format!("short send: {} of {} bytes", sent, datagram.len()),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, kind: PayloadKind) -> bool {
        matches!(kind, PayloadKind::Document | PayloadKind::Line)
    }
}
