//! The one-shot capability a handler uses to submit its response asynchronously.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::connection::Connection;
use crate::error::TriggerError;
use crate::exchange::{Exchange, Phase};
use crate::handler::ResponseProducer;

/// Capability object with a single operation, [`ResponseTrigger::submit_response`].
///
/// Firing installs the producer on the associated [`Exchange`] and requests
/// output readiness on the associated [`Connection`]; both become observable
/// together because installation happens under the exchange's mutex (§5),
/// so the connection never requests output without the producer already in
/// place.
///
/// The trigger may fire at most once per instance (invariant 5). The guard is
/// an atomic flag checked before entering the lock, per the design notes.
pub struct ResponseTrigger {
    exchange: Arc<Exchange>,
    connection: Arc<dyn Connection>,
    fired: Arc<AtomicBool>,
}

impl ResponseTrigger {
    /// Creates a trigger bound to the given exchange and connection. Used
    /// internally by [`crate::service::ServiceHandler`] when invoking a handler.
    pub(crate) fn new(exchange: Arc<Exchange>, connection: Arc<dyn Connection>) -> Self {
        Self { exchange, connection, fired: Arc::new(AtomicBool::new(false)) }
    }

    /// Submits `producer` as the response for the current exchange.
    ///
    /// Returns [`TriggerError::AlreadyFired`] on a second invocation, and is
    /// safe to call from any thread, at any time after the handler was
    /// invoked — including after the connection has been severed, in which
    /// case the producer is simply dropped once the attempt to install it
    /// observes the exchange is no longer waiting for one.
    pub fn submit_response(&self, producer: Box<dyn ResponseProducer>) -> Result<(), TriggerError> {
        if self.fired.swap(true, Ordering::AcqRel) {
            return Err(TriggerError::AlreadyFired);
        }

        let installed = self.exchange.with_state(|state| {
            if state.phase != Phase::Handling {
                // The exchange was reset (e.g. the connection closed) before
                // the handler completed. Safe no-op per §5 cancellation policy.
                return false;
            }
            state.response_producer = Some(producer);
            state.phase = Phase::ResponseReady;
            true
        });

        if installed {
            self.connection.request_output();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnStatus;
    use crate::context::Context;
    use http::{Request, Response, StatusCode};
    use std::sync::Mutex;

    struct RecordingConnection {
        context: Mutex<Context>,
        output_requested: AtomicBool,
    }

    impl Connection for RecordingConnection {
        fn context(&self) -> &Mutex<Context> {
            &self.context
        }
        fn submit_response(&self, _response: &Response<()>) -> std::io::Result<()> {
            Ok(())
        }
        fn suspend_input(&self) {}
        fn request_input(&self) {}
        fn request_output(&self) {
            self.output_requested.store(true, Ordering::SeqCst);
        }
        fn close(&self) {}
        fn shutdown(&self) {}
        fn set_socket_timeout(&self, _millis: u64) {}
        fn status(&self) -> ConnStatus {
            ConnStatus::Active
        }
        fn is_response_submitted(&self) -> bool {
            false
        }
    }

    struct StubProducer;
    impl ResponseProducer for StubProducer {
        fn generate_response(&mut self) -> Response<()> {
            Response::builder().status(StatusCode::OK).body(()).unwrap()
        }
        fn produce_content(
            &mut self,
            _encoder: &mut dyn crate::connection::ContentEncoder,
            _connection: &dyn Connection,
        ) -> std::io::Result<()> {
            Ok(())
        }
        fn close(&mut self) {}
    }

    fn connection() -> Arc<dyn Connection> {
        Arc::new(RecordingConnection { context: Mutex::new(Context::new()), output_requested: AtomicBool::new(false) })
    }

    #[test]
    fn firing_installs_producer_and_requests_output() {
        let exchange = Arc::new(Exchange::new());
        exchange.with_state(|s| {
            s.phase = crate::exchange::Phase::Handling;
            s.request = Some(Request::builder().body(()).unwrap());
        });
        let conn = connection();
        let trigger = ResponseTrigger::new(exchange.clone(), conn.clone());

        trigger.submit_response(Box::new(StubProducer)).unwrap();

        assert!(exchange.is_response_ready());
        assert_eq!(exchange.phase(), crate::exchange::Phase::ResponseReady);
    }

    #[test]
    fn second_fire_is_a_state_error() {
        let exchange = Arc::new(Exchange::new());
        exchange.with_state(|s| s.phase = crate::exchange::Phase::Handling);
        let trigger = ResponseTrigger::new(exchange, connection());

        trigger.submit_response(Box::new(StubProducer)).unwrap();
        let second = trigger.submit_response(Box::new(StubProducer));

        assert_eq!(second.unwrap_err(), TriggerError::AlreadyFired);
    }

    #[test]
    fn fire_after_reset_is_a_safe_no_op() {
        let exchange = Arc::new(Exchange::new());
        exchange.with_state(|s| s.phase = crate::exchange::Phase::Handling);
        let trigger = ResponseTrigger::new(exchange.clone(), connection());

        exchange.reset();
        trigger.submit_response(Box::new(StubProducer)).unwrap();

        assert!(!exchange.is_response_ready());
    }
}
