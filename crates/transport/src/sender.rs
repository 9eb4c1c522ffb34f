//! Sending packets.

use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use codec::Packet;
use tokio::net::{TcpSocket, TcpStream, UdpSocket};

use crate::error::TransportError;
use crate::framing::FrameCodec;
use crate::writer::OscWriter;

/// Common interface of the UDP and TCP senders.
///
/// Sends are fire-and-forget at the protocol level: a successful send means
/// the bytes were handed to the socket, not that they arrived.
pub trait Sender: Send {
    /// Send an encoded packet.
    fn send_bytes(
        &mut self,
        bytes: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Encode and send a message or bundle.
    fn send<P: Packet>(
        &mut self,
        packet: &P,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let bytes = packet.to_bytes();
        self.send_bytes(bytes)
    }

    /// Stop sending. Later sends fail with [`TransportError::Closed`].
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether [`Sender::close`] has been called.
    fn is_closed(&self) -> bool;

    /// The local address the sender is bound to.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// Sends datagrams to a fixed remote address.
#[derive(Debug)]
pub struct UdpSender {
    socket: Option<UdpSocket>,
    remote: SocketAddr,
}

impl UdpSender {
    /// Bind a local socket which will send to `remote`. Use port 0 to let
    /// the system choose the local port.
    pub async fn bind(local: SocketAddr, remote: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(local).await?;
        tracing::debug!(local_addr = %socket.local_addr()?, %remote, "bound udp sender");
        Ok(Self {
            socket: Some(socket),
            remote,
        })
    }

    /// Where [`Sender::send_bytes`] sends datagrams.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Allow sending to broadcast addresses.
    pub fn set_broadcast(&self, on: bool) -> Result<(), TransportError> {
        Ok(self.socket()?.set_broadcast(on)?)
    }

    /// Send a packet to an address other than the configured remote.
    pub async fn send_to(
        &self,
        packet: &impl Packet,
        target: SocketAddr,
    ) -> Result<(), TransportError> {
        let bytes = packet.to_bytes();
        let sent = self.socket()?.send_to(&bytes, target).await?;
        tracing::trace!(%target, len = sent, "sent datagram");
        Ok(())
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::Closed)
    }
}

impl Sender for UdpSender {
    async fn send_bytes(&mut self, bytes: Bytes) -> Result<(), TransportError> {
        let sent = self.socket()?.send_to(&bytes, self.remote).await?;
        tracing::trace!(target = %self.remote, len = sent, "sent datagram");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.socket.take().is_some() {
            tracing::debug!(remote = %self.remote, "closed udp sender");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket()?.local_addr()?)
    }
}

#[derive(Debug)]
enum TcpState {
    Bound(TcpSocket),
    Connected(OscWriter<TcpStream>),
    Closed,
}

/// Sends length-prefixed packets over a TCP connection.
///
/// Either [`TcpSender::bind`] to a local address and then
/// [`TcpSender::connect`], or use [`TcpSender::connect_to`] for both at once.
#[derive(Debug)]
pub struct TcpSender {
    state: TcpState,
    codec: FrameCodec,
}

impl TcpSender {
    /// Bind to `local` ahead of [`TcpSender::connect`].
    pub fn bind(local: SocketAddr) -> Result<Self, TransportError> {
        Self::bind_with_codec(local, FrameCodec::new())
    }

    /// Like [`TcpSender::bind`], framing packets with `codec`.
    pub fn bind_with_codec(local: SocketAddr, codec: FrameCodec) -> Result<Self, TransportError> {
        let socket = if local.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.bind(local)?;
        tracing::debug!(local_addr = %socket.local_addr()?, "bound tcp sender");
        Ok(Self {
            state: TcpState::Bound(socket),
            codec,
        })
    }

    /// Bind an unspecified local address of the same family as `remote` and
    /// connect.
    pub async fn connect_to(remote: SocketAddr) -> Result<Self, TransportError> {
        let local = match remote {
            SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
            SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
        };
        let mut sender = Self::bind(local)?;
        sender.connect(remote).await?;
        Ok(sender)
    }

    /// Connect the bound socket to `remote`.
    pub async fn connect(&mut self, remote: SocketAddr) -> Result<(), TransportError> {
        let socket = match std::mem::replace(&mut self.state, TcpState::Closed) {
            TcpState::Bound(socket) => socket,
            TcpState::Connected(writer) => {
                self.state = TcpState::Connected(writer);
                return Err(TransportError::Io(std::io::ErrorKind::AlreadyExists.into()));
            }
            TcpState::Closed => return Err(TransportError::Closed),
        };
        let stream = socket.connect(remote).await?;
        stream.set_nodelay(true)?;
        tracing::debug!(%remote, "tcp sender connected");
        self.state = TcpState::Connected(OscWriter::with_codec(stream, self.codec.clone()));
        Ok(())
    }

    /// Whether a connection is open.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, TcpState::Connected(_))
    }

    /// Address of the connected peer, or [`TransportError::NotConnected`].
    pub fn peer_addr(&self) -> Result<SocketAddr, TransportError> {
        match &self.state {
            TcpState::Connected(writer) => Ok(writer.get_ref().peer_addr()?),
            TcpState::Bound(_) => Err(TransportError::NotConnected),
            TcpState::Closed => Err(TransportError::Closed),
        }
    }
}

impl Sender for TcpSender {
    async fn send_bytes(&mut self, bytes: Bytes) -> Result<(), TransportError> {
        match &mut self.state {
            TcpState::Connected(writer) => {
                let len = bytes.len();
                writer.send_bytes(bytes).await?;
                tracing::trace!(len, "sent frame");
                Ok(())
            }
            TcpState::Bound(_) => Err(TransportError::NotConnected),
            TcpState::Closed => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, TcpState::Closed) {
            TcpState::Connected(mut writer) => {
                writer.close().await?;
                tracing::debug!("closed tcp sender");
            }
            TcpState::Bound(_) | TcpState::Closed => {}
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        matches!(self.state, TcpState::Closed)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        match &self.state {
            TcpState::Bound(socket) => Ok(socket.local_addr()?),
            TcpState::Connected(writer) => Ok(writer.get_ref().local_addr()?),
            TcpState::Closed => Err(TransportError::Closed),
        }
    }
}
