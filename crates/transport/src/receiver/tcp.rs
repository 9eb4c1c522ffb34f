//! Stream receiver. Packets arrive length-prefixed on accepted connections.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use dispatch::Dispatcher;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use super::{ErrorSlot, Receiver, ReceiverState, back_off, invalid_state, retry_delay};
use crate::error::TransportError;
use crate::framing::FrameCodec;

/// A live connection accepted by a [`TcpReceiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Assigned in accept order, starting at zero.
    pub id: u64,
    /// The remote end of the connection.
    pub peer: SocketAddr,
}

#[derive(Debug)]
struct Connection {
    peer: SocketAddr,
    task: JoinHandle<()>,
}

type Connections = Arc<Mutex<HashMap<u64, Connection>>>;

fn lock(connections: &Connections) -> MutexGuard<'_, HashMap<u64, Connection>> {
    connections.lock().unwrap_or_else(|e| e.into_inner())
}

/// Receives length-prefixed OSC packets over TCP and dispatches their
/// messages.
///
/// Each accepted connection is served by its own task. A malformed packet is
/// dropped without affecting the connection; an oversized frame or an I/O
/// error closes that connection only and is reported to the error handler.
/// A failed accept is reported too, and the receiver keeps listening.
#[derive(Debug)]
pub struct TcpReceiver {
    dispatcher: Arc<Dispatcher>,
    codec: FrameCodec,
    state: ReceiverState,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    errors: ErrorSlot,
    connections: Connections,
    cancel_token: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
}

impl TcpReceiver {
    /// A receiver dispatching to `dispatcher`, with the default frame size
    /// limit.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_codec(dispatcher, FrameCodec::new())
    }

    /// A receiver whose frame size limit comes from `settings`.
    pub fn from_settings(dispatcher: Arc<Dispatcher>, settings: &config::TcpSettings) -> Self {
        Self::with_codec(dispatcher, FrameCodec::from_settings(settings))
    }

    /// A receiver framing connections with `codec`.
    pub fn with_codec(dispatcher: Arc<Dispatcher>, codec: FrameCodec) -> Self {
        Self {
            dispatcher,
            codec,
            state: ReceiverState::Idle,
            listener: None,
            local_addr: None,
            errors: ErrorSlot::default(),
            connections: Arc::default(),
            cancel_token: CancellationToken::new(),
            accept_task: None,
        }
    }

    /// The dispatcher incoming messages go to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Currently open connections, oldest first.
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        let mut out: Vec<ConnectionInfo> = lock(&self.connections)
            .iter()
            .map(|(&id, c)| ConnectionInfo { id, peer: c.peer })
            .collect();
        out.sort_by_key(|c| c.id);
        out
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        lock(&self.connections).len()
    }

    fn spawn_accept_task(&self, listener: TcpListener) -> JoinHandle<()> {
        let server = Server {
            dispatcher: Arc::clone(&self.dispatcher),
            codec: self.codec.clone(),
            errors: self.errors.clone(),
            connections: Arc::clone(&self.connections),
        };
        tokio::spawn(accept_loop(listener, server, self.cancel_token.clone()))
    }
}

/// Source of incoming connections.
trait Accept: Send + Sync + 'static {
    type Stream: AsyncRead + Send + Unpin + 'static;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    type Stream = TcpStream;

    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Accept connections until cancelled.
///
/// A failed accept is reported and the loop carries on, pausing first when
/// the failure concerns the listener rather than one peer.
async fn accept_loop<L: Accept>(listener: L, server: Server, cancel: CancellationToken) {
    let mut next_id: u64 = 0;
    loop {
        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("accept task cancelled");
                break;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                if cancel.is_cancelled() {
                    break;
                }
                let id = next_id;
                next_id += 1;
                server.start_connection(id, stream, peer, cancel.child_token());
            }
            Err(e) => {
                let delay = retry_delay(&e);
                let e = TransportError::from(e);
                tracing::error!(error = %e, "accept failed");
                server.errors.report(&e, None);
                if !back_off(&cancel, delay).await {
                    break;
                }
            }
        }
    }
}

/// State shared by the accept task and the connection tasks.
struct Server {
    dispatcher: Arc<Dispatcher>,
    codec: FrameCodec,
    errors: ErrorSlot,
    connections: Connections,
}

impl Server {
    fn start_connection<S>(&self, id: u64, stream: S, peer: SocketAddr, cancel: CancellationToken)
    where
        S: AsyncRead + Send + Unpin + 'static,
    {
        tracing::debug!(id, %peer, "accepted connection");
        let dispatcher = Arc::clone(&self.dispatcher);
        let errors = self.errors.clone();
        let connections = Arc::clone(&self.connections);
        let mut frames = FramedRead::new(stream, self.codec.clone());

        // held across the spawn so the task cannot remove its entry before
        // it has been inserted
        let mut table = lock(&self.connections);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(id, %peer, "connection cancelled");
                        break;
                    }
                    frame = frames.next() => {
                        match frame {
                            Some(Ok(frame)) => {
                                if cancel.is_cancelled() {
                                    break;
                                }
                                tracing::trace!(id, len = frame.len(), "received frame");
                                if let Err(e) = dispatcher.dispatch_packet(&frame) {
                                    tracing::warn!(error = %e, %peer, "dropping malformed packet");
                                }
                            }
                            Some(Err(e)) => {
                                tracing::error!(error = %e, id, %peer, "connection failed");
                                errors.report(&e, Some(peer));
                                break;
                            }
                            None => {
                                tracing::debug!(id, %peer, "peer closed connection");
                                break;
                            }
                        }
                    }
                }
            }
            lock(&connections).remove(&id);
        });
        table.insert(id, Connection { peer, task });
    }
}

impl Receiver for TcpReceiver {
    async fn bind(&mut self, addr: SocketAddr) -> Result<SocketAddr, TransportError> {
        if self.state != ReceiverState::Idle {
            return Err(invalid_state("bind", self.state));
        }
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::debug!(%local_addr, "bound tcp receiver");

        self.listener = Some(listener);
        self.local_addr = Some(local_addr);
        self.state = ReceiverState::Bound;
        Ok(local_addr)
    }

    fn listen(&mut self) -> Result<(), TransportError> {
        let listener = match (self.state, self.listener.take()) {
            (ReceiverState::Bound, Some(listener)) => listener,
            (state, listener) => {
                self.listener = listener;
                return Err(invalid_state("listen", state));
            }
        };
        self.accept_task = Some(self.spawn_accept_task(listener));
        self.state = ReceiverState::Listening;
        tracing::debug!(local_addr = ?self.local_addr, "tcp receiver listening");
        Ok(())
    }

    async fn close(&mut self) {
        if self.state == ReceiverState::Closed {
            return;
        }
        self.cancel_token.cancel();
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "accept task failed");
            }
        }

        let tasks: Vec<JoinHandle<()>> = lock(&self.connections)
            .drain()
            .map(|(_, connection)| connection.task)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "connection task failed");
            }
        }

        self.listener = None;
        self.state = ReceiverState::Closed;
        tracing::debug!(local_addr = ?self.local_addr, "closed tcp receiver");
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

impl Drop for TcpReceiver {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
