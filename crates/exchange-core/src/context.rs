//! The attribute bag threaded through request processing and handler invocation.
//!
//! The data model calls for a "key/value attribute bag" with a handful of
//! well-known keys (request handle, response handle, connection handle, and
//! the exchange key used internally). `http::Extensions` already is a
//! type-keyed attribute bag, so `Context` is a thin wrapper around it: the
//! well-known keys become newtypes inserted/looked up by type instead of by
//! string, which is the idiomatic Rust rendition of the same contract.

use std::sync::Arc;

use http::{Extensions, Request, Response};

use crate::connection::Connection;
use crate::exchange::Exchange;

/// A connection-scoped attribute bag, cleared on every [`crate::exchange::Exchange`] reset.
#[derive(Debug, Default)]
pub struct Context {
    extensions: Extensions,
}

impl Context {
    /// Creates a new, empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a well-known or user attribute, returning any previous value.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    /// Returns a reference to an attribute of type `T`, if present.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Returns a mutable reference to an attribute of type `T`, if present.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions.get_mut::<T>()
    }

    /// Removes and returns an attribute of type `T`, if present.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions.remove::<T>()
    }

    /// True once every attribute has been removed (invariant 4 of the data model).
    pub fn is_empty(&self) -> bool {
        self.extensions.len() == 0
    }

    /// Clears every attribute, returning the bag to its post-reset state.
    pub fn clear(&mut self) {
        self.extensions.clear();
    }
}

/// Well-known attribute key for the unique identifier of the connection the
/// current exchange belongs to. Connection identity itself stays with the
/// external `Connection`; this is a lightweight, `Copy`, loggable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Well-known attribute key: the current request, placed into the context by
/// `requestReceived` (component design §4.1 step 3) before the interceptor
/// chain and the resolved handler run, so either can read it without its own
/// parameter.
#[derive(Debug, Clone)]
pub struct RequestHandle(pub Request<()>);

/// Well-known attribute key: the committed response, placed into the context
/// during response commit (component design §4.2 step 3) alongside storing it
/// on the `Exchange` itself, so `ReuseStrategy` and any late interceptor can
/// read it from the one attribute bag both paths already share.
#[derive(Debug, Clone)]
pub struct ResponseHandle(pub Response<()>);

/// Well-known attribute key: the connection the current exchange belongs to,
/// inserted into the connection's own context by [`crate::service::ServiceHandler::connected`].
#[derive(Clone)]
pub struct ConnectionHandle(pub Arc<dyn Connection>);

/// Well-known attribute key: the per-connection [`Exchange`], attached to the
/// connection's own context on `connected` (§3 invariant 1) and looked up by
/// every subsequent readiness callback.
#[derive(Clone)]
pub struct ExchangeHandle(pub Arc<Exchange>);
