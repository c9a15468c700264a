//! The request/response interceptor chain.
//!
//! Generalizes the teacher crate's `Decorator`/`DecoratorComposer` pattern
//! (`crates/web/src/decorator`) from wrapping a handler to running an ordered
//! chain of request/response interceptors over the message in place, the way
//! the component design's `Processor` is used: once over the request before
//! handler resolution, once over the response before the head is committed.

use http::{Request, Response};

use crate::context::Context;

/// A single request/response interceptor.
pub trait Processor: Send + Sync {
    /// Runs before the request is handed to the resolved handler.
    fn process_request(&self, _request: &mut Request<()>, _context: &mut Context) {}

    /// Runs before the response head is submitted on the wire.
    fn process_response(&self, _response: &mut Response<()>, _context: &mut Context) {}
}

/// An interceptor that does nothing, used as the identity element of a chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityProcessor;

impl Processor for IdentityProcessor {}

/// An ordered chain of interceptors, run in registration order for requests
/// and in the same order for responses (the component design does not
/// require response interceptors to run in reverse order).
#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    /// Creates an empty chain (equivalent to [`IdentityProcessor`]).
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a processor to the end of the chain.
    pub fn push(&mut self, processor: impl Processor + 'static) -> &mut Self {
        self.processors.push(Box::new(processor));
        self
    }
}

impl Processor for ProcessorChain {
    fn process_request(&self, request: &mut Request<()>, context: &mut Context) {
        for processor in &self.processors {
            processor.process_request(request, context);
        }
    }

    fn process_response(&self, response: &mut Response<()>, context: &mut Context) {
        for processor in &self.processors {
            processor.process_response(response, context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, StatusCode};

    struct TagRequest;
    impl Processor for TagRequest {
        fn process_request(&self, request: &mut Request<()>, _context: &mut Context) {
            request.headers_mut().insert("x-seen", HeaderValue::from_static("1"));
        }
    }

    struct TagResponse;
    impl Processor for TagResponse {
        fn process_response(&self, response: &mut Response<()>, _context: &mut Context) {
            response.headers_mut().insert("x-seen", HeaderValue::from_static("1"));
        }
    }

    #[test]
    fn chain_runs_in_registration_order() {
        let mut chain = ProcessorChain::new();
        chain.push(TagRequest).push(TagResponse);

        let mut request = Request::builder().body(()).unwrap();
        let mut context = Context::new();
        chain.process_request(&mut request, &mut context);
        assert_eq!(request.headers().get("x-seen").unwrap(), "1");

        let mut response = Response::builder().status(StatusCode::OK).body(()).unwrap();
        chain.process_response(&mut response, &mut context);
        assert_eq!(response.headers().get("x-seen").unwrap(), "1");
    }

    #[test]
    fn identity_processor_is_a_no_op() {
        let mut request = Request::builder().body(()).unwrap();
        let mut context = Context::new();
        IdentityProcessor.process_request(&mut request, &mut context);
        assert!(request.headers().is_empty());
    }
}
