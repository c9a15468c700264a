//! Maps a request URI to the [`RequestHandler`] that should serve it.

use std::sync::Mutex;

use http::{Method, Request};
use triomphe::Arc;

use crate::context::Context;
use crate::error::ProtocolError;
use crate::handler::{RequestConsumer, RequestHandler};
use crate::trigger::ResponseTrigger;

/// Resolves an incoming request to the handler that should serve it.
#[cfg_attr(test, mockall::automock)]
pub trait HandlerResolver: Send + Sync {
    /// Looks up a handler for `uri`. Returns `None` if no handler matches.
    fn lookup(&self, uri: &http::Uri) -> Option<Arc<dyn RequestHandler>>;
}

/// Fallback [`RequestHandler`] used when no [`HandlerResolver`] is configured,
/// or when one is configured but finds no match. Yields a fixed
/// "method not implemented" response, equivalent to the 501 branch of
/// [`crate::error::ErrorMapper`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRequestHandler;

struct NullConsumer {
    method: Method,
}

impl RequestConsumer for NullConsumer {
    fn request_received(&mut self, _request: &Request<()>) {}

    fn consume_content(
        &mut self,
        _decoder: &mut dyn crate::connection::ContentDecoder,
        _connection: &dyn crate::connection::Connection,
    ) -> std::io::Result<()> {
        Ok(())
    }

    fn request_completed(&mut self, _context: &mut Context) {}

    fn exception(&self) -> Option<&ProtocolError> {
        None
    }

    fn result(&mut self) -> Box<dyn std::any::Any + Send> {
        Box::new(ProtocolError::MethodNotSupported(self.method.to_string()))
    }
}

impl RequestHandler for NullRequestHandler {
    fn process_request(&self, request: &Request<()>, _context: &mut Context) -> Box<dyn RequestConsumer> {
        Box::new(NullConsumer { method: request.method().clone() })
    }

    fn handle(
        &self,
        result: Box<dyn std::any::Any + Send>,
        trigger: ResponseTrigger,
        _context: std::sync::Arc<Mutex<Context>>,
    ) {
        // The `NullConsumer::result` contract always yields a `ProtocolError`
        // (§4.5's 501 branch); a downcast failure here means some other
        // `RequestConsumer` was wired to this handler by mistake — not a
        // protocol violation, so it maps to the "otherwise" 500 bucket
        // instead of `ProtocolError::other`'s 400.
        let error = result
            .downcast::<ProtocolError>()
            .map(|e| *e)
            .unwrap_or_else(|_| ProtocolError::internal("request consumer produced an unexpected result type"));

        let response = crate::error::ErrorMapper::response_for(&error);
        let (parts, body) = response.into_parts();
        let producer = crate::handler::FixedResponseProducer::new(http::Response::from_parts(parts, ()), body.to_vec());
        let _ = trigger.submit_response(Box::new(producer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Exchange, Phase};
    use crate::connection::{ConnStatus, Connection};
    use std::sync::Mutex;

    struct NoopConnection {
        context: Mutex<Context>,
    }

    impl Connection for NoopConnection {
        fn context(&self) -> &Mutex<Context> {
            &self.context
        }
        fn submit_response(&self, _response: &http::Response<()>) -> std::io::Result<()> {
            Ok(())
        }
        fn suspend_input(&self) {}
        fn request_input(&self) {}
        fn request_output(&self) {}
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

    #[test]
    fn null_handler_yields_501() {
        let handler = NullRequestHandler;
        let request = Request::builder().method(Method::TRACE).uri("/").body(()).unwrap();
        let mut ctx = Context::new();
        let mut consumer = handler.process_request(&request, &mut ctx);
        consumer.request_completed(&mut ctx);
        let result = consumer.result();

        let exchange = std::sync::Arc::new(Exchange::new());
        exchange.with_state(|s| s.phase = Phase::Handling);
        let connection: std::sync::Arc<dyn Connection> =
            std::sync::Arc::new(NoopConnection { context: Mutex::new(Context::new()) });
        let trigger = ResponseTrigger::new(exchange.clone(), connection);

        handler.handle(result, trigger, std::sync::Arc::new(Mutex::new(ctx)));

        exchange.with_state(|s| {
            let producer = s.response_producer.as_mut().expect("producer installed");
            assert_eq!(producer.generate_response().status(), http::StatusCode::NOT_IMPLEMENTED);
        });
    }

    #[test]
    fn null_handler_maps_an_unexpected_result_type_to_500_not_400() {
        let handler = NullRequestHandler;
        let exchange = std::sync::Arc::new(Exchange::new());
        exchange.with_state(|s| s.phase = Phase::Handling);
        let connection: std::sync::Arc<dyn Connection> =
            std::sync::Arc::new(NoopConnection { context: Mutex::new(Context::new()) });
        let trigger = ResponseTrigger::new(exchange.clone(), connection);

        // A `RequestConsumer` that doesn't honor the `NullConsumer` contract,
        // simulating a mismatched consumer/handler pairing.
        let bogus_result: Box<dyn std::any::Any + Send> = Box::new(42u32);
        handler.handle(bogus_result, trigger, std::sync::Arc::new(Mutex::new(Context::new())));

        exchange.with_state(|s| {
            let producer = s.response_producer.as_mut().expect("producer installed");
            assert_eq!(producer.generate_response().status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        });
    }

    #[test]
    fn mocked_resolver_reports_no_match_for_unregistered_uris() {
        let mut mock = MockHandlerResolver::new();
        mock.expect_lookup().withf(|uri| uri.path() == "/missing").times(1).return_const(None);

        let uri: http::Uri = "/missing".parse().unwrap();
        assert!(mock.lookup(&uri).is_none());
    }
}
