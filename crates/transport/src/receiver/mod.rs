//! Receiving packets and dispatching them.
//!
//! A receiver owns a socket and a background task which decodes every
//! incoming packet and hands its messages to a shared
//! [`Dispatcher`](dispatch::Dispatcher).

mod tcp;
mod udp;

pub use tcp::{ConnectionInfo, TcpReceiver};
pub use udp::UdpReceiver;

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Pause after an accept or receive failure which concerns the socket
/// itself, such as running out of file descriptors.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Lifecycle of a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Bound,
    Listening,
    Closed,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReceiverState::Idle => "idle",
            ReceiverState::Bound => "bound",
            ReceiverState::Listening => "listening",
            ReceiverState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Callback for transport failures raised by a receiver's background tasks,
/// with the remote address when one is known.
pub type ErrorHandler = Arc<dyn Fn(&TransportError, Option<SocketAddr>) + Send + Sync>;

/// Common interface of the UDP and TCP receivers.
///
/// `bind` and `listen` must be called in that order; `close` may be called
/// at any time and stops all dispatching before it returns.
pub trait Receiver: Send {
    /// Bind the socket. Returns the bound address, which tells the actual
    /// port when binding to port 0.
    fn bind(
        &mut self,
        addr: SocketAddr,
    ) -> impl Future<Output = Result<SocketAddr, TransportError>> + Send;

    /// Start receiving in a background task. Requires a tokio runtime.
    fn listen(&mut self) -> Result<(), TransportError>;

    /// Stop receiving and release the socket. Once this returns no handler
    /// will be called for this receiver again.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Where the receiver is in its lifecycle.
    fn state(&self) -> ReceiverState;

    /// The bound address, once [`Receiver::bind`] has succeeded.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Install the callback for transport failures.
    fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&TransportError, Option<SocketAddr>) + Send + Sync + 'static;
}

/// Shared slot holding the error callback, readable from background tasks.
#[derive(Clone, Default)]
pub(crate) struct ErrorSlot(Arc<Mutex<Option<ErrorHandler>>>);

impl ErrorSlot {
    pub(crate) fn set(&self, handler: ErrorHandler) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    pub(crate) fn report(&self, error: &TransportError, peer: Option<SocketAddr>) {
        let handler = self.0.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(handler) = handler {
            handler(error, peer);
        }
    }
}

impl fmt::Debug for ErrorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed = self.0.lock().map(|h| h.is_some()).unwrap_or(false);
        f.debug_tuple("ErrorSlot").field(&installed).finish()
    }
}

fn invalid_state(operation: &'static str, state: ReceiverState) -> TransportError {
    TransportError::InvalidState { operation, state }
}

/// How long to wait before accepting or receiving again after `error`.
/// Failures caused by a single peer are retried straight away.
fn retry_delay(error: &io::Error) -> Option<Duration> {
    match error.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => None,
        _ => Some(RETRY_DELAY),
    }
}

/// Wait out `delay`. Returns false if `cancel` fires first.
async fn back_off(cancel: &CancellationToken, delay: Option<Duration>) -> bool {
    let Some(delay) = delay else {
        return !cancel.is_cancelled();
    };
    tracing::debug!(?delay, "backing off");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
