//! The event-driven HTTP/1.x exchange state machine.
//!
//! [`ServiceHandler`] is the single entry point a non-blocking reactor drives:
//! one instance is shared across every connection it owns, while all mutable
//! per-connection state lives in the [`Exchange`] the reactor attaches to
//! that connection's context on `connected`. Every method here is
//! synchronous and returns promptly, per the non-blocking discipline in §5
//! of the component design this crate implements.

use std::sync::{Arc, Mutex};

use http::{Method, Request, Response, StatusCode, Version, header};

use crate::connection::{Connection, ContentDecoder, ContentEncoder};
use crate::context::{Context, ConnectionHandle, ExchangeHandle, RequestHandle, ResponseHandle};
use crate::error::{ErrorMapper, ProtocolError};
use crate::exchange::{Exchange, Phase};
use crate::handler::{FixedResponseProducer, RequestHandler};
use crate::params::DefaultParameters;
use crate::processor::{IdentityProcessor, Processor};
use crate::resolver::{HandlerResolver, NullRequestHandler};
use crate::reuse::{DefaultReuseStrategy, ReuseStrategy};
use crate::trigger::ResponseTrigger;

/// The grace window granted to a `CLOSING` connection before it is forced shut.
const TIMEOUT_GRACE_MILLIS: u64 = 250;

/// A [`HandlerResolver`] that never matches, leaving [`NullRequestHandler`] to
/// handle every request. The default when no resolver is configured.
#[derive(Debug, Default, Clone, Copy)]
struct NoResolver;

impl HandlerResolver for NoResolver {
    fn lookup(&self, _uri: &http::Uri) -> Option<triomphe::Arc<dyn RequestHandler>> {
        None
    }
}

/// The event-driven state machine sequencing one HTTP/1.x exchange at a time
/// per connection.
pub struct ServiceHandler {
    resolver: Arc<dyn HandlerResolver>,
    fallback: NullRequestHandler,
    processor: Arc<dyn Processor>,
    reuse_strategy: Arc<dyn ReuseStrategy>,
    default_params: DefaultParameters,
}

impl Default for ServiceHandler {
    fn default() -> Self {
        Self::new(Arc::new(NoResolver))
    }
}

impl ServiceHandler {
    /// Creates a handler resolving requests via `resolver`, with the identity
    /// processor, [`DefaultReuseStrategy`], and default `Server` identification.
    pub fn new(resolver: Arc<dyn HandlerResolver>) -> Self {
        Self {
            resolver,
            fallback: NullRequestHandler,
            processor: Arc::new(IdentityProcessor),
            reuse_strategy: Arc::new(DefaultReuseStrategy),
            default_params: DefaultParameters::default(),
        }
    }

    /// Replaces the request/response interceptor chain.
    pub fn with_processor(mut self, processor: impl Processor + 'static) -> Self {
        self.processor = Arc::new(processor);
        self
    }

    /// Replaces the connection-reuse policy.
    pub fn with_reuse_strategy(mut self, reuse_strategy: impl ReuseStrategy + 'static) -> Self {
        self.reuse_strategy = Arc::new(reuse_strategy);
        self
    }

    /// Replaces the default-parameter overlay (e.g. to advertise a custom `Server` value).
    pub fn with_default_parameters(mut self, default_params: DefaultParameters) -> Self {
        self.default_params = default_params;
        self
    }

    fn exchange_of(&self, connection: &dyn Connection) -> Option<Arc<Exchange>> {
        let guard = connection.context().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get::<ExchangeHandle>().map(|handle| handle.0.clone())
    }

    /// `connected(conn)`: allocates and attaches the per-connection [`Exchange`]
    /// (§3 invariant 1). Post-condition: `Phase::Idle`.
    pub fn connected(&self, connection: &dyn Connection) {
        let exchange = Arc::new(Exchange::new());
        let mut guard = connection.context().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(ExchangeHandle(exchange));
        tracing::debug!("connection established");
    }

    /// `closed(conn)`: retrieves the exchange and releases its owned resources.
    pub fn closed(&self, connection: &dyn Connection) {
        let Some(exchange) = self.exchange_of(connection) else { return };
        let (consumer, producer) = exchange.reset();
        if let Some(mut consumer) = consumer {
            consumer.close();
        }
        if let Some(mut producer) = producer {
            producer.close();
        }
        tracing::debug!("connection closed");
    }

    /// `requestReceived(conn)`. `request` is the head the connection has
    /// already parsed and handed to the reactor as this event's payload.
    pub fn request_received(&self, connection: &Arc<dyn Connection>, mut request: Request<()>) {
        let Some(exchange) = self.exchange_of(connection.as_ref()) else {
            tracing::error!("requestReceived on a connection with no exchange");
            connection.shutdown();
            return;
        };

        // Version support is the external `Connection`'s concern (§1: byte-level
        // parsing/framing is out of scope here): an unparseable or unsupported
        // version never reaches this callback as a `Request`, it arrives as a
        // `protocol_exception` instead, mapped by `ErrorMapper` to 505. This
        // callback accepts whatever version the head carries and, per §4.1 step
        // 7, only ever *downgrades* it for the 100-continue response below.
        self.default_params.apply_request(&mut request);

        let mut context = Context::new();
        context.insert(ConnectionHandle(connection.clone()));
        context.insert(RequestHandle(request.clone()));
        self.processor.process_request(&mut request, &mut context);

        let handler: triomphe::Arc<dyn RequestHandler> =
            self.resolver.lookup(request.uri()).unwrap_or_else(|| triomphe::Arc::new(self.fallback));

        let mut consumer = handler.process_request(&request, &mut context);
        consumer.request_received(&request);

        let expects_continue = request
            .headers()
            .get(header::EXPECT)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("100-continue"));
        let entity_enclosing = has_entity(&request);
        let version = request.version();

        exchange.with_state(|state| {
            state.phase = Phase::ReceivingHead;
            state.context = Arc::new(Mutex::new(context));
            state.request_handler = Some(handler);
            state.request_consumer = Some(consumer);
            state.request = Some(request);
        });

        if !entity_enclosing {
            connection.suspend_input();
            self.process_request(connection, &exchange);
            return;
        }

        if expects_continue {
            exchange.with_state(|state| state.phase = Phase::ExpectContinue);
            let continue_response = Response::builder()
                .status(StatusCode::CONTINUE)
                .version(std::cmp::min(version, Version::HTTP_11))
                .body(())
                .expect("100 Continue is always a valid response");
            if let Err(error) = connection.submit_response(&continue_response) {
                self.io_exception(connection.as_ref(), error);
            }
        } else {
            exchange.with_state(|state| state.phase = Phase::ReceivingBody);
        }
    }

    /// `inputReady(conn, decoder)`: delivers bytes to the consumer; on
    /// completion, suspends input and proceeds to `processRequest`.
    pub fn input_ready(&self, connection: &Arc<dyn Connection>, decoder: &mut dyn ContentDecoder) {
        let Some(exchange) = self.exchange_of(connection.as_ref()) else { return };

        let outcome = exchange.with_state(|state| {
            let consumer = state
                .request_consumer
                .as_deref_mut()
                .expect("inputReady fired while RECEIVING_BODY with no consumer");
            consumer.consume_content(decoder, connection.as_ref())
        });

        if let Err(error) = outcome {
            self.io_exception(connection.as_ref(), error);
            return;
        }

        if decoder.is_completed() {
            connection.suspend_input();
            self.process_request(connection, &exchange);
        }
    }

    /// Internal `processRequest` transition (`RECEIVING_BODY`/`RECEIVING_HEAD` → `HANDLING`).
    fn process_request(&self, connection: &Arc<dyn Connection>, exchange: &Arc<Exchange>) {
        exchange.with_state(|state| state.phase = Phase::Handling);

        let context = exchange.with_state(|state| Arc::clone(&state.context));
        {
            let mut guard = context.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            exchange.with_state(|state| {
                state.request_consumer.as_deref_mut().expect("HANDLING with no consumer").request_completed(&mut guard)
            });
        }

        let exception = exchange.with_state(|state| {
            state.request_consumer.as_deref().and_then(|consumer| consumer.exception()).cloned()
        });

        if let Some(error) = exception {
            let response = ErrorMapper::response_for(&error);
            let (parts, body) = response.into_parts();
            let producer = FixedResponseProducer::new(Response::from_parts(parts, ()), body.to_vec());
            exchange.with_state(|state| {
                state.response_producer = Some(Box::new(producer));
                state.phase = Phase::ResponseReady;
            });
            connection.request_output();
            return;
        }

        let (handler, result) = exchange.with_state(|state| {
            let handler =
                state.request_handler.clone().expect("HANDLING with no resolved handler");
            let result = state.request_consumer.as_deref_mut().expect("HANDLING with no consumer").result();
            (handler, result)
        });

        let trigger = ResponseTrigger::new(Arc::clone(exchange), Arc::clone(connection));
        handler.handle(result, trigger, context);
    }

    /// `responseReady(conn)`: guarded on `isResponseReady`.
    pub fn response_ready(&self, connection: &Arc<dyn Connection>) {
        let Some(exchange) = self.exchange_of(connection.as_ref()) else { return };
        if !exchange.is_response_ready() {
            return;
        }
        self.commit_response(connection.as_ref(), &exchange);
    }

    /// `outputReady(conn, encoder)`: drives the producer; on completion, ends the cycle.
    pub fn output_ready(&self, connection: &Arc<dyn Connection>, encoder: &mut dyn ContentEncoder) {
        let Some(exchange) = self.exchange_of(connection.as_ref()) else { return };

        let outcome = exchange.with_state(|state| {
            let producer =
                state.response_producer.as_deref_mut().expect("outputReady fired with no producer");
            producer.produce_content(encoder, connection.as_ref())
        });

        if let Err(error) = outcome {
            self.io_exception(connection.as_ref(), error);
            return;
        }

        if encoder.is_completed() {
            self.finish_cycle(connection.as_ref(), &exchange);
        }
    }

    /// `timeout(conn)`: closes gracefully, granting a brief grace window if
    /// the close transitioned (synchronously or not — see design notes) to
    /// `CLOSING`, else forces a shutdown.
    pub fn timeout(&self, connection: &dyn Connection) {
        use crate::connection::ConnStatus;

        if connection.status() != ConnStatus::Active {
            return;
        }

        connection.close();
        if connection.status() == ConnStatus::Closing {
            connection.set_socket_timeout(TIMEOUT_GRACE_MILLIS);
        } else {
            connection.shutdown();
        }
    }

    /// `protocolException(conn, ex)`: commits a synthetic error response if
    /// none has been submitted yet, otherwise closes and reports.
    pub fn protocol_exception(&self, connection: &dyn Connection, error: ProtocolError) {
        if connection.is_response_submitted() {
            tracing::error!(%error, "protocol exception after response already submitted");
            connection.close();
            return;
        }

        let Some(exchange) = self.exchange_of(connection) else {
            tracing::error!(%error, "protocol exception on a connection with no exchange");
            connection.shutdown();
            return;
        };

        tracing::warn!(%error, "protocol exception, synthesizing error response");

        let response = ErrorMapper::response_for(&error);
        let (parts, body) = response.into_parts();
        let producer = FixedResponseProducer::new(Response::from_parts(parts, ()), body.to_vec());

        exchange.with_state(|state| {
            state.response_producer = Some(Box::new(producer));
            state.phase = Phase::ResponseReady;
        });

        self.commit_response(connection, &exchange);
    }

    /// `ioException(conn, ex)`: unconditionally shuts down the connection.
    pub fn io_exception(&self, connection: &dyn Connection, error: std::io::Error) {
        tracing::error!(%error, "io exception, shutting down connection");
        connection.shutdown();
    }

    /// Response commit (component design §4.2), given an exchange in `RESPONSE_READY`.
    fn commit_response(&self, connection: &dyn Connection, exchange: &Arc<Exchange>) {
        let mut response = exchange.with_state(|state| {
            state.response_producer.as_deref_mut().expect("RESPONSE_READY implies a producer").generate_response()
        });

        self.default_params.apply(&mut response);

        let method = exchange
            .with_state(|state| state.request.as_ref().map(Request::method).cloned())
            .unwrap_or(Method::GET);

        let context = exchange.with_state(|state| Arc::clone(&state.context));
        {
            let mut guard = context.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.processor.process_response(&mut response, &mut guard);
        }

        let body_allowed = can_response_have_body(&method, response.status());
        if !body_allowed {
            strip_entity_headers(&mut response);
        }

        // Insert only after the interceptor chain and body-suppression have
        // run: `ResponseHandle` is documented as the *committed* response, so
        // any late reader of the context must see the final head, not a
        // pre-processing snapshot.
        {
            let mut guard = context.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.insert(ResponseHandle(response.clone()));
        }

        exchange.with_state(|state| {
            state.response = Some(response.clone());
            state.handled = true;
        });

        if let Err(error) = connection.submit_response(&response) {
            self.io_exception(connection, error);
            return;
        }

        if body_allowed {
            exchange.with_state(|state| state.phase = Phase::SendingBody);
        } else {
            self.finish_cycle(connection, exchange);
        }
    }

    /// Ends the current cycle: resets the exchange, consults the reuse
    /// policy, and either closes the connection or re-arms input.
    fn finish_cycle(&self, connection: &dyn Connection, exchange: &Arc<Exchange>) {
        let keep_alive = exchange.with_state(|state| {
            let response = state.response.as_ref().expect("finish_cycle without a committed response");
            let guard = state.context.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.reuse_strategy.keep_alive(response, &guard)
        });

        let (consumer, producer) = exchange.reset();
        if let Some(mut consumer) = consumer {
            consumer.close();
        }
        if let Some(mut producer) = producer {
            producer.close();
        }

        if keep_alive {
            connection.request_input();
        } else {
            connection.close();
        }
    }
}

/// Whether `request` declares an entity via `Content-Length` or `Transfer-Encoding`.
fn has_entity(request: &Request<()>) -> bool {
    request.headers().contains_key(header::CONTENT_LENGTH) || request.headers().contains_key(header::TRANSFER_ENCODING)
}

/// The body-suppression predicate (component design §4.2 step 6), preserved
/// verbatim per the open question it resolves: the underlying status check is
/// `status >= 200 && status ∉ {204, 205, 304}`, which classifies every 1xx
/// status as "no body" too — correct here because 100 Continue is submitted
/// directly in `request_received` and never reaches this predicate.
fn can_response_have_body(method: &Method, status: StatusCode) -> bool {
    if method == Method::HEAD {
        return false;
    }
    status.as_u16() >= 200 && !matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED)
}

/// Strips headers that would misdescribe a body-suppressed response.
fn strip_entity_headers(response: &mut Response<()>) {
    response.headers_mut().remove(header::CONTENT_LENGTH);
    response.headers_mut().remove(header::TRANSFER_ENCODING);
}
