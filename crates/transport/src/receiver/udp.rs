//! Datagram receiver. Every datagram is one packet.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use dispatch::Dispatcher;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ErrorSlot, Receiver, ReceiverState, back_off, invalid_state, retry_delay};
use crate::error::TransportError;

/// Receives OSC packets over UDP and dispatches their messages.
///
/// Receive failures go to the error handler and do not stop the receiver.
///
/// ```ignore
/// use std::sync::Arc;
/// use dispatch::Dispatcher;
/// use transport::{Receiver, UdpReceiver};
///
/// let dispatcher = Arc::new(Dispatcher::new());
/// dispatcher.register("/fader/*", |msg| { println!("{msg}"); Ok(()) });
///
/// let mut receiver = UdpReceiver::new(dispatcher);
/// receiver.bind("0.0.0.0:9000".parse()?).await?;
/// receiver.listen()?;
/// ```
#[derive(Debug)]
pub struct UdpReceiver {
    dispatcher: Arc<Dispatcher>,
    buffer_size: usize,
    state: ReceiverState,
    socket: Option<UdpSocket>,
    local_addr: Option<SocketAddr>,
    errors: ErrorSlot,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl UdpReceiver {
    /// A receiver dispatching to `dispatcher`, with default settings.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::from_settings(dispatcher, &config::UdpSettings::default())
    }

    /// A receiver whose receive buffer size comes from `settings`.
    pub fn from_settings(dispatcher: Arc<Dispatcher>, settings: &config::UdpSettings) -> Self {
        Self {
            dispatcher,
            buffer_size: settings.receive_buffer_size.max(1),
            state: ReceiverState::Idle,
            socket: None,
            local_addr: None,
            errors: ErrorSlot::default(),
            cancel_token: CancellationToken::new(),
            task: None,
        }
    }

    /// The dispatcher incoming messages go to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn spawn_receive_task(&self, socket: UdpSocket) -> JoinHandle<()> {
        tokio::spawn(receive_loop(
            socket,
            Arc::clone(&self.dispatcher),
            self.errors.clone(),
            self.cancel_token.clone(),
            self.buffer_size,
        ))
    }
}

/// Source of datagrams.
trait RecvFrom: Send + Sync + 'static {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

impl RecvFrom for UdpSocket {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send {
        UdpSocket::recv_from(self, buf)
    }
}

/// Receive and dispatch datagrams until cancelled.
///
/// Receive failures are reported and receiving carries on. On some
/// platforms an ICMP port unreachable reply to an earlier send shows up
/// here as a connection reset, which says nothing about this socket.
async fn receive_loop<S: RecvFrom>(
    socket: S,
    dispatcher: Arc<Dispatcher>,
    errors: ErrorSlot,
    cancel: CancellationToken,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("udp receive task cancelled");
                break;
            }
            received = socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((len, peer)) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::trace!(%peer, len, "received datagram");
                if let Err(e) = dispatcher.dispatch_packet(&buf[..len]) {
                    tracing::warn!(error = %e, %peer, "dropping malformed packet");
                }
            }
            Err(e) => {
                let delay = retry_delay(&e);
                let e = TransportError::from(e);
                tracing::error!(error = %e, "udp receive failed");
                errors.report(&e, None);
                if !back_off(&cancel, delay).await {
                    break;
                }
            }
        }
    }
}

impl Receiver for UdpReceiver {
    async fn bind(&mut self, addr: SocketAddr) -> Result<SocketAddr, TransportError> {
        if self.state != ReceiverState::Idle {
            return Err(invalid_state("bind", self.state));
        }
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        tracing::debug!(%local_addr, "bound udp receiver");

        self.socket = Some(socket);
        self.local_addr = Some(local_addr);
        self.state = ReceiverState::Bound;
        Ok(local_addr)
    }

    fn listen(&mut self) -> Result<(), TransportError> {
        let socket = match (self.state, self.socket.take()) {
            (ReceiverState::Bound, Some(socket)) => socket,
            (state, socket) => {
                self.socket = socket;
                return Err(invalid_state("listen", state));
            }
        };
        self.task = Some(self.spawn_receive_task(socket));
        self.state = ReceiverState::Listening;
        tracing::debug!(local_addr = ?self.local_addr, "udp receiver listening");
        Ok(())
    }

    async fn close(&mut self) {
        if self.state == ReceiverState::Closed {
            return;
        }
        self.cancel_token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "udp receive task failed");
            }
        }
        self.socket = None;
        self.state = ReceiverState::Closed;
        tracing::debug!(local_addr = ?self.local_addr, "closed udp receiver");
    }

    fn state(&self) -> ReceiverState {
        self.state
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&TransportError, Option<SocketAddr>) + Send + Sync + 'static,
    {
        self.errors.set(Arc::new(handler));
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
