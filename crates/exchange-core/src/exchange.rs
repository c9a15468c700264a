//! The per-connection exchange record and its phase.
//!
//! One [`Exchange`] exists per connection across its lifetime (invariant 1 of
//! the data model): it is created on `connected`, mutated under its own
//! mutex by every readiness callback (invariant 2, §5), and reset between
//! cycles and on `closed` (invariant 4). It is attached to the connection's
//! own attribute bag under the well-known `Exchange` key, realized here as
//! `Arc<Exchange>` being itself the type-keyed entry in [`crate::context::Context`].

use std::fmt;
use std::sync::{Arc, Mutex};

use http::{Request, Response};

use crate::context::Context;
use crate::handler::{RequestConsumer, RequestHandler, ResponseProducer};

/// The phase of one request/response cycle, as named in the component design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No active request. Entered at connect and after reset.
    Idle,
    /// Headers parsed; handler resolved, consumer created, interceptors run.
    ReceivingHead,
    /// Sub-state of `ReceivingHead`: a `100 Continue` has been submitted and
    /// input remains enabled while the body arrives.
    ExpectContinue,
    /// `input_ready` drives the consumer until its decoder completes.
    ReceivingBody,
    /// Input suspended; the handler has been invoked with a one-shot trigger.
    Handling,
    /// A response producer has been submitted; the next `response_ready`
    /// commits the response head.
    ResponseReady,
    /// Response head committed; `output_ready` drives the producer.
    SendingBody,
}

/// The mutable state guarded by [`Exchange`]'s mutex.
///
/// `context` is itself behind its own `Arc<Mutex<_>>` rather than held bare:
/// [`RequestHandler::handle`] hands a clone of it to a handler that may
/// complete on another thread well after this call returns (§5), and that
/// handler must be able to read and mutate the same attribute bag the
/// response-commit path consults afterward.
pub struct ExchangeState {
    pub phase: Phase,
    pub context: Arc<Mutex<Context>>,
    pub request_handler: Option<triomphe::Arc<dyn RequestHandler>>,
    pub request_consumer: Option<Box<dyn RequestConsumer>>,
    pub response_producer: Option<Box<dyn ResponseProducer>>,
    pub request: Option<Request<()>>,
    pub response: Option<Response<()>>,
    pub handled: bool,
}

impl fmt::Debug for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeState")
            .field("phase", &self.phase)
            .field("handled", &self.handled)
            .field("has_consumer", &self.request_consumer.is_some())
            .field("has_producer", &self.response_producer.is_some())
            .finish()
    }
}

impl Default for ExchangeState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            context: Arc::new(Mutex::new(Context::new())),
            request_handler: None,
            request_consumer: None,
            response_producer: None,
            request: None,
            response: None,
            handled: false,
        }
    }
}

impl ExchangeState {
    /// Invariant 3: `isResponseReady ≡ !handled ∧ responseProducer ≠ null`.
    pub fn is_response_ready(&self) -> bool {
        !self.handled && self.response_producer.is_some()
    }
}

/// Per-connection record of the current request/response cycle and its phase.
///
/// Identity is stable across the connection's lifetime; only the contents of
/// the guarded [`ExchangeState`] are reset between cycles (invariant 1).
pub struct Exchange {
    state: Mutex<ExchangeState>,
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_lock() {
            Ok(guard) => f.debug_struct("Exchange").field("state", &*guard).finish(),
            Err(_) => f.debug_struct("Exchange").field("state", &"<locked>").finish(),
        }
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    /// Creates a fresh exchange in [`Phase::Idle`].
    pub fn new() -> Self {
        Self { state: Mutex::new(ExchangeState::default()) }
    }

    /// Runs `f` under the exchange's mutex, serializing concurrent callbacks
    /// and trigger fires per §5. `f` must not block or await.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ExchangeState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Snapshot of the current phase.
    pub fn phase(&self) -> Phase {
        self.with_state(|s| s.phase)
    }

    /// Snapshot of invariant 3.
    pub fn is_response_ready(&self) -> bool {
        self.with_state(ExchangeState::is_response_ready)
    }

    /// Resets the exchange for the next cycle (or for `closed`), returning
    /// ownership of the consumer/producer so the caller can release them
    /// outside the lock (invariant 4: every owned resource is released
    /// exactly once).
    pub fn reset(&self) -> (Option<Box<dyn RequestConsumer>>, Option<Box<dyn ResponseProducer>>) {
        self.with_state(|s| {
            let consumer = s.request_consumer.take();
            let producer = s.response_producer.take();
            s.request_handler = None;
            s.request = None;
            s.response = None;
            s.handled = false;
            s.context.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
            s.phase = Phase::Idle;
            (consumer, producer)
        })
    }
}
