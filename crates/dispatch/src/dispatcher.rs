//! The handler table.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use codec::{DecodeError, Message, PacketDecoder};

use crate::pattern::Pattern;

/// Error a handler may return. It is logged and otherwise ignored.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A message handler.
pub type Handler = Arc<dyn Fn(&Message) -> Result<(), HandlerError> + Send + Sync>;

struct Listener {
    pattern: Pattern,
    handler: Handler,
}

/// Routes messages to the handlers registered for matching patterns.
///
/// The table is guarded by a lock, but handlers are always called after the
/// lock has been released, so a handler may register or remove handlers on
/// the dispatcher that is calling it. Such changes apply from the next
/// dispatched message on.
pub struct Dispatcher {
    listeners: RwLock<Vec<Listener>>,
    decoder: PacketDecoder,
}

impl Dispatcher {
    /// An empty dispatcher with the default bundle nesting limit.
    pub fn new() -> Self {
        Self::with_decoder(PacketDecoder::default())
    }

    /// A dispatcher whose [`Dispatcher::dispatch_packet`] uses `decoder`.
    pub fn with_decoder(decoder: PacketDecoder) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            decoder,
        }
    }

    /// Register `handler` for `pattern`.
    ///
    /// Registering a pattern that is already present replaces its handler
    /// and keeps its position; new patterns go to the end.
    pub fn register<F>(&self, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let pattern = Pattern::new(pattern);
        let handler: Handler = Arc::new(handler);
        let mut listeners = self.write();
        match listeners.iter_mut().find(|l| l.pattern == pattern) {
            Some(existing) => {
                tracing::debug!(%pattern, "replacing handler");
                existing.handler = handler;
            }
            None => {
                tracing::debug!(%pattern, "registering handler");
                listeners.push(Listener { pattern, handler });
            }
        }
    }

    /// Remove the handler registered for exactly `pattern`. Wildcards are not
    /// evaluated. Returns whether a handler was removed.
    pub fn remove(&self, pattern: &str) -> bool {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|l| l.pattern.as_str() != pattern);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!(%pattern, "removed handler");
        }
        removed
    }

    /// Registered patterns in registration order.
    pub fn patterns(&self) -> Vec<String> {
        self.read()
            .iter()
            .map(|l| l.pattern.as_str().to_string())
            .collect()
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Call every handler whose pattern matches the message's address, in
    /// registration order. Returns the number of handlers called.
    ///
    /// A handler that fails or panics is logged and the remaining handlers
    /// still run.
    pub fn dispatch(&self, message: &Message) -> usize {
        let address = Pattern::new(message.address());
        let matched: Vec<(Pattern, Handler)> = self
            .read()
            .iter()
            .filter(|l| l.pattern.matches(&address))
            .map(|l| (l.pattern.clone(), Arc::clone(&l.handler)))
            .collect();

        if matched.is_empty() {
            tracing::trace!(address = %message.address(), "no handler for message");
            return 0;
        }

        for (pattern, handler) in &matched {
            match catch_unwind(AssertUnwindSafe(|| (**handler)(message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        error = %e,
                        %pattern,
                        address = %message.address(),
                        "handler failed"
                    );
                }
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .copied()
                        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                        .unwrap_or("unknown");
                    tracing::warn!(
                        %reason,
                        %pattern,
                        address = %message.address(),
                        "handler panicked"
                    );
                }
            }
        }
        matched.len()
    }

    /// Decode a packet and dispatch each of its messages.
    ///
    /// A packet that fails to decode dispatches nothing; the error is handed
    /// back for the caller to log.
    pub fn dispatch_packet(&self, data: &[u8]) -> Result<usize, DecodeError> {
        let messages = self.decoder.decode(data)?;
        Ok(messages.iter().map(|m| self.dispatch(m)).sum())
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Listener>> {
        self.listeners.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Listener>> {
        self.listeners.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("patterns", &self.patterns())
            .field("max_bundle_depth", &self.decoder.max_depth())
            .finish()
    }
}
