//! Concrete tokio transports.  Each connect helper returns the write
//! side wrapped as a `Transport` plus the read side, which the host's
//! event loop feeds back into `Connection::handle_input`.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};

use crate::transport::{Transport, TransportKind};

/// The write half of a TCP stream to a nameserver.
pub struct TcpTransport {
    writer: OwnedWriteHalf,
}

impl TcpTransport {
    pub async fn connect(addr: SocketAddr) -> io::Result<(Self, OwnedReadHalf)> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok((Self { writer }, reader))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    async fn send(&mut self, octets: &[u8]) -> io::Result<()> {
        self.writer.write_all(octets).await
    }
}

/// A connected UDP socket to a nameserver.  The socket is shared with
/// the read loop, so sends and receives do not fight over ownership.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub async fn connect(addr: SocketAddr) -> io::Result<(Self, Arc<UdpSocket>)> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;
        let socket = Arc::new(socket);
        Ok((
            Self {
                socket: socket.clone(),
            },
            socket,
        ))
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }

    async fn send(&mut self, octets: &[u8]) -> io::Result<()> {
        self.socket.send(octets).await.map(|_| ())
    }
}
