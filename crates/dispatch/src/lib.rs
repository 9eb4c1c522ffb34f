//! Routing of decoded OSC messages to handlers.
//!
//! Handlers are registered against address patterns. A message is delivered
//! to every handler whose pattern matches its address, in registration order.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use codec::Message;
//! use dispatch::Dispatcher;
//!
//! let hits = Arc::new(AtomicUsize::new(0));
//! let dispatcher = Dispatcher::new();
//! let counter = Arc::clone(&hits);
//! dispatcher.register("/mixer/*/gain", move |_msg: &Message| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! assert_eq!(dispatcher.dispatch(&Message::new("/mixer/3/gain").with(0.5f32)), 1);
//! assert_eq!(dispatcher.dispatch(&Message::new("/mixer/3/pan")), 0);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

mod dispatcher;
pub mod pattern;

pub use dispatcher::{Dispatcher, Handler, HandlerError};
pub use pattern::{Pattern, matches};
