//! HTTP request handler contracts.
//!
//! This module defines the core abstractions user code implements to process
//! requests: [`RequestHandler`] resolves an incoming head into a
//! [`RequestConsumer`] that drains the body, then is invoked once the body is
//! fully consumed with a one-shot [`crate::trigger::ResponseTrigger`] it uses
//! to eventually supply a [`ResponseProducer`].
//!
//! The handler's `handle` call itself is synchronous and must not block: it
//! either fires the trigger immediately (an in-hand response) or hands the
//! trigger to work spawned elsewhere (an asynchronously produced one). For
//! the common case of a single `async fn` producing the whole response,
//! [`make_async_handler`] bridges that ergonomic style onto the synchronous
//! contract the state machine requires.

use std::any::Any;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};

use http::{Request, Response};

use crate::connection::{Connection, ContentDecoder, ContentEncoder};
use crate::context::Context;
use crate::error::ProtocolError;
use crate::trigger::ResponseTrigger;

/// Handler-supplied sink for incoming request bytes.
///
/// One [`RequestConsumer`] is created per request by
/// [`RequestHandler::process_request`] and owns whatever resources it
/// allocates to buffer or stream the body; [`RequestConsumer::close`] is
/// called exactly once, during [`crate::exchange::Exchange::reset`].
pub trait RequestConsumer: Send {
    /// Delivers the request head, once parsed.
    fn request_received(&mut self, request: &Request<()>);

    /// Incremental body delivery. May toggle input readiness on `connection`
    /// (e.g. to apply backpressure). Returning `Err` records a failure that
    /// is later surfaced via [`RequestConsumer::exception`] and mapped by
    /// [`crate::error::ErrorMapper`].
    fn consume_content(&mut self, decoder: &mut dyn ContentDecoder, connection: &dyn Connection) -> io::Result<()>;

    /// Notifies the consumer that the request has been fully received.
    fn request_completed(&mut self, context: &mut Context);

    /// A failure recorded while consuming the request, if any.
    fn exception(&self) -> Option<&ProtocolError>;

    /// The consumer's result object, handed to [`RequestHandler::handle`].
    /// Taking the result is only meaningful once, after `request_completed`.
    fn result(&mut self) -> Box<dyn Any + Send>;

    /// Releases any resources owned by the consumer. Called exactly once.
    fn close(&mut self) {}
}

/// Handler-supplied source for outgoing response bytes.
pub trait ResponseProducer: Send {
    /// Produces the response head. Called once, while committing the response.
    fn generate_response(&mut self) -> Response<()>;

    /// Incremental body emission. May toggle output readiness on `connection`.
    fn produce_content(&mut self, encoder: &mut dyn ContentEncoder, connection: &dyn Connection) -> io::Result<()>;

    /// Releases any resources owned by the producer. Called exactly once.
    fn close(&mut self) {}
}

/// The core interface for resolving and handling HTTP requests.
pub trait RequestHandler: Send + Sync {
    /// Resolves the (now fully headed) request into a consumer that will
    /// drain its body, if any.
    fn process_request(&self, request: &Request<()>, context: &mut Context) -> Box<dyn RequestConsumer>;

    /// Invoked once the request has been fully consumed. The handler may
    /// call `trigger.submit_response(..)` synchronously (an immediate
    /// response) or hand `trigger` off to work completing later, on any
    /// thread.
    ///
    /// `context` is the exchange's own attribute bag, shared (not copied)
    /// with the response-commit path that runs once the trigger fires: a
    /// handler completing on another thread still sees, and can contribute
    /// to, the same bag the response interceptors and [`crate::reuse::ReuseStrategy`]
    /// consult afterward.
    fn handle(&self, result: Box<dyn Any + Send>, trigger: ResponseTrigger, context: Arc<Mutex<Context>>);
}

/// A [`RequestConsumer`] that buffers the entire body into memory, matching
/// the common case of a handler that wants the whole request up front.
#[derive(Default)]
pub struct BufferingConsumer {
    buffer: Vec<u8>,
    exception: Option<ProtocolError>,
}

impl BufferingConsumer {
    /// Creates an empty buffering consumer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestConsumer for BufferingConsumer {
    fn request_received(&mut self, _request: &Request<()>) {}

    fn consume_content(&mut self, decoder: &mut dyn ContentDecoder, _connection: &dyn Connection) -> io::Result<()> {
        let buffer = &mut self.buffer;
        decoder.read(&mut |chunk| buffer.extend_from_slice(chunk))?;
        Ok(())
    }

    fn request_completed(&mut self, _context: &mut Context) {}

    fn exception(&self) -> Option<&ProtocolError> {
        self.exception.as_ref()
    }

    fn result(&mut self) -> Box<dyn Any + Send> {
        Box::new(std::mem::take(&mut self.buffer))
    }
}

/// A [`ResponseProducer`] that writes a fixed, already-in-memory body.
pub struct FixedResponseProducer {
    response: Option<Response<()>>,
    body: Vec<u8>,
    written: usize,
}

impl FixedResponseProducer {
    /// Creates a producer that will emit `head` followed by `body`.
    pub fn new(head: Response<()>, body: Vec<u8>) -> Self {
        Self { response: Some(head), body, written: 0 }
    }
}

impl ResponseProducer for FixedResponseProducer {
    fn generate_response(&mut self) -> Response<()> {
        self.response.take().expect("generate_response called more than once")
    }

    fn produce_content(&mut self, encoder: &mut dyn ContentEncoder, _connection: &dyn Connection) -> io::Result<()> {
        while self.written < self.body.len() {
            let n = encoder.write(&self.body[self.written..])?;
            if n == 0 {
                return Ok(());
            }
            self.written += n;
        }
        encoder.complete()
    }
}

/// Creates a [`RequestHandler`] from an `async fn(Vec<u8>, Arc<Mutex<Context>>) ->
/// (Response<()>, Vec<u8>)`-shaped closure, bridging the ergonomic "one async
/// function produces the whole response" style onto the trigger-based contract.
///
/// The request body is buffered in full before the future runs (via
/// [`BufferingConsumer`]); the future is driven to completion on the given
/// [`tokio::runtime::Handle`], and the resulting head/body pair is submitted
/// through the trigger on completion.
pub fn make_async_handler<F, Fut>(runtime: tokio::runtime::Handle, f: F) -> AsyncHandlerFn<F>
where
    F: Fn(Vec<u8>, Arc<Mutex<Context>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Response<()>, Vec<u8>)> + Send + 'static,
{
    AsyncHandlerFn { f, runtime }
}

/// A [`RequestHandler`] built by [`make_async_handler`].
pub struct AsyncHandlerFn<F> {
    f: F,
    runtime: tokio::runtime::Handle,
}

impl<F, Fut> RequestHandler for AsyncHandlerFn<F>
where
    F: Fn(Vec<u8>, Arc<Mutex<Context>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Response<()>, Vec<u8>)> + Send + 'static,
{
    fn process_request(&self, _request: &Request<()>, _context: &mut Context) -> Box<dyn RequestConsumer> {
        Box::new(BufferingConsumer::new())
    }

    fn handle(&self, result: Box<dyn Any + Send>, trigger: ResponseTrigger, context: Arc<Mutex<Context>>) {
        // `BufferingConsumer::result` always yields a `Vec<u8>`; a downcast
        // failure here is not a protocol violation but a mismatched
        // consumer/handler pairing, so it maps to the "otherwise" 500
        // bucket rather than being silently treated as an empty body.
        let body = match result.downcast::<Vec<u8>>() {
            Ok(body) => *body,
            Err(_) => {
                let response =
                    crate::error::ErrorMapper::response_for_unknown("request consumer produced an unexpected result type");
                let (parts, body) = response.into_parts();
                let _ = trigger.submit_response(Box::new(FixedResponseProducer::new(Response::from_parts(parts, ()), body.to_vec())));
                return;
            }
        };
        let fut = (self.f)(body, context);
        self.runtime.spawn(async move {
            let (head, body) = fut.await;
            let _ = trigger.submit_response(Box::new(FixedResponseProducer::new(head, body)));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn buffering_consumer_starts_with_no_exception() {
        let consumer = BufferingConsumer::new();
        assert!(consumer.exception().is_none());
    }

    #[test]
    fn fixed_producer_yields_head_once() {
        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let mut producer = FixedResponseProducer::new(head, b"hi".to_vec());
        let got = producer.generate_response();
        assert_eq!(got.status(), StatusCode::OK);
    }
}
