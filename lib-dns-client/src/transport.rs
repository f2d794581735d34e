//! The transport collaborator consumed by a connection.  The
//! connection never touches a socket itself: it hands octets to a
//! `Transport` and is fed inbound octets by whoever owns the read
//! side.

use async_trait::async_trait;
use std::io;

/// How the transport delimits messages.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TransportKind {
    /// A continuous byte stream; messages carry a two-octet
    /// big-endian length prefix.
    Stream,

    /// One message per transport unit, no prefix.
    Datagram,
}

/// The write side of a connection's socket.
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Send already-framed octets.  For stream transports the caller
    /// has prepended the length prefix.
    async fn send(&mut self, octets: &[u8]) -> io::Result<()>;
}
