//! Error types for the exchange state machine
//!
//! This module provides the error taxonomy described in the error handling
//! design: protocol errors raised while parsing or processing a request head,
//! consumer errors recorded by a [`crate::handler::RequestConsumer`], trigger
//! misuse, and the top-level error that wraps them for propagation out of a
//! [`crate::service::ServiceHandler`] callback.
//!
//! [`ErrorMapper`] is the pure function that turns a [`ProtocolError`] into a
//! synthetic, user-visible error response: `HTTP/1.0`, connection-close, with
//! the exception message as a plain-text body.

use std::io;

use http::{Response, StatusCode, Version};
use bytes::Bytes;
use thiserror::Error;

/// The top-level error type surfaced by [`crate::service::ServiceHandler`] callbacks.
///
/// Protocol and consumer errors ((a) and (b) in the error handling design) are
/// recoverable: they are mapped to a response and delivered on the wire. I/O
/// errors and trigger misuse are not: they terminate the connection.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// A protocol error encountered while parsing or processing a request head.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An I/O error reported by the connection. Always terminal for the connection.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Misuse of a [`crate::trigger::ResponseTrigger`].
    #[error("trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// A runtime/invariant violation inside a callback. These are bugs: the
    /// connection is terminated and the error is propagated upward.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl ExchangeError {
    /// Creates an invariant-violation error with the given message.
    pub fn invariant<S: ToString>(message: S) -> Self {
        Self::Invariant(message.to_string())
    }
}

/// Errors raised while parsing or processing a request head, or recorded by a
/// [`crate::handler::RequestConsumer`] and surfaced via `getException`.
#[derive(Debug, Error, Clone)]
pub enum ProtocolError {
    /// The request method is not supported by the resolved handler.
    #[error("method not supported: {0}")]
    MethodNotSupported(String),

    /// The request declares an HTTP version this server does not support.
    #[error("unsupported http version: {0:?}")]
    UnsupportedHttpVersion(Version),

    /// Any other protocol violation (malformed head, ...).
    #[error("{reason}")]
    Other { reason: String },

    /// A failure that is not itself a protocol violation at all — e.g. a
    /// consumer or handler collaborator behaving unexpectedly. Distinct from
    /// [`ProtocolError::Other`] ("other ProtocolException" → 400): this is
    /// the `spec.md` §4.3 "otherwise" bucket, for exceptions that are not a
    /// `ProtocolException` in the first place.
    #[error("{reason}")]
    Internal { reason: String },
}

impl ProtocolError {
    /// Creates an `Other` protocol error from a displayable reason.
    pub fn other<S: ToString>(reason: S) -> Self {
        Self::Other { reason: reason.to_string() }
    }

    /// Creates an `Internal` error from a displayable reason — the
    /// "otherwise" bucket for a failure that isn't a protocol violation.
    pub fn internal<S: ToString>(reason: S) -> Self {
        Self::Internal { reason: reason.to_string() }
    }

    /// The message placed in the body of a synthesized error response.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Misuse of a [`crate::trigger::ResponseTrigger`]: a null producer (argument
/// violation) or a second `submit_response` on the same instance (state violation).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TriggerError {
    /// `submit_response` was called with no producer.
    #[error("response producer must not be null")]
    NullProducer,

    /// `submit_response` was called more than once on the same trigger.
    #[error("response trigger already fired")]
    AlreadyFired,
}

/// Pure mapping from a [`ProtocolError`] to a status code and a synthetic,
/// user-visible error response.
///
/// Per the error handling design: response version is `HTTP/1.0`, keep-alive
/// is `false`, and the body is the exception message (or its string form, if
/// no message is present).
pub struct ErrorMapper;

impl ErrorMapper {
    /// Maps a protocol error to the status code the response should carry.
    pub fn status_for(error: &ProtocolError) -> StatusCode {
        match error {
            ProtocolError::MethodNotSupported(_) => StatusCode::NOT_IMPLEMENTED,
            ProtocolError::UnsupportedHttpVersion(_) => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            ProtocolError::Other { .. } => StatusCode::BAD_REQUEST,
            ProtocolError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the synthetic error response for a protocol error.
    ///
    /// The response is `HTTP/1.0`, has `Connection: close` semantics (callers
    /// consult [`crate::reuse::ReuseStrategy`] separately; this response simply
    /// never advertises keep-alive), and carries the error message as a
    /// plain-text body.
    pub fn response_for(error: &ProtocolError) -> Response<Bytes> {
        let status = Self::status_for(error);
        let body = Bytes::from(error.message());

        Response::builder()
            .status(status)
            .version(Version::HTTP_10)
            .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(http::header::CONNECTION, "close")
            .body(body)
            .expect("status/version/headers are always valid")
    }

    /// Maps any exception reported outside the protocol-error hierarchy
    /// (runtime errors surfaced as a generic failure) to the catch-all 500
    /// branch described in the error mapper's specification — `spec.md`
    /// §4.3's "otherwise" case, distinct from the "other ProtocolException"
    /// 400 bucket [`ProtocolError::Other`] covers.
    pub fn response_for_unknown(message: impl ToString) -> Response<Bytes> {
        Self::response_for(&ProtocolError::internal(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_method_not_supported_to_501() {
        let err = ProtocolError::MethodNotSupported("TRACE".into());
        assert_eq!(ErrorMapper::status_for(&err), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn maps_unsupported_version_to_505() {
        let err = ProtocolError::UnsupportedHttpVersion(Version::HTTP_2);
        assert_eq!(ErrorMapper::status_for(&err), StatusCode::HTTP_VERSION_NOT_SUPPORTED);
    }

    #[test]
    fn maps_other_protocol_error_to_400() {
        let err = ProtocolError::other("malformed header");
        assert_eq!(ErrorMapper::status_for(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn response_is_http_10_with_message_body() {
        let err = ProtocolError::other("boom");
        let response = ErrorMapper::response_for(&err);
        assert_eq!(response.version(), Version::HTTP_10);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get(http::header::CONNECTION).unwrap(), "close");
    }

    #[test]
    fn maps_internal_error_to_500() {
        let err = ProtocolError::internal("unexpected failure");
        assert_eq!(ErrorMapper::status_for(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_for_unknown_is_500_distinct_from_other_protocol_errors() {
        let response = ErrorMapper::response_for_unknown("boom");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.version(), Version::HTTP_10);
    }
}
