//! Best-effort datagram transport for encoded frames.
//!
//! Sends are fire-and-forget: a failed send is reported to the caller, which
//! counts it and moves on. Nothing here retries.

use anyhow::{Context, Result};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Io(#[from] io::Error),

    #[error("datagram truncated: sent {sent} of {expected} bytes")]
    Truncated { sent: usize, expected: usize },
}

/// Destination for encoded audio frames. One call carries one frame.
pub trait TransportSink {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    fn name(&self) -> &'static str {
        "unknown_transport"
    }
}

impl<T: TransportSink + ?Sized> TransportSink for Box<T> {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Connected UDP socket pointed at the server.
pub struct UdpSink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpSink {
    pub fn connect(bind: SocketAddr, server: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind)
            .with_context(|| format!("failed to bind UDP socket on {bind}"))?;
        socket
            .connect(server)
            .with_context(|| format!("failed to connect UDP socket to {server}"))?;
        Ok(Self {
            socket,
            peer: server,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Second handle on the same socket for the command listener, so server
    /// replies arrive on the port the frames leave from.
    pub fn try_clone_socket(&self) -> io::Result<UdpSocket> {
        self.socket.try_clone()
    }
}

impl TransportSink for UdpSink {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send(payload)?;
        if sent != payload.len() {
            return Err(TransportError::Truncated {
                sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}
