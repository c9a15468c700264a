//! The external, non-blocking connection contract.
//!
//! `exchange-core` never touches a socket directly: the TCP/TLS reactor and
//! the byte-level HTTP parser/framer are external collaborators, consumed
//! here only through the [`Connection`] trait and the [`ContentDecoder`]/
//! [`ContentEncoder`] byte contracts handed to `input_ready`/`output_ready`.
//!
//! `Connection` plays the role of both the connection handle and the
//! `ioControl` parameter described alongside `consumeContent`/`produceContent`
//! in the source design: `suspend_input`/`request_input`/`request_output`
//! already live here, so one object satisfies both roles.

use std::io;

use http::Response;

use crate::context::Context;

/// Lifecycle status of a connection, as reported by [`Connection::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    /// The connection is open and may still exchange data.
    Active,
    /// A graceful close has been requested; in-flight I/O may still complete.
    Closing,
    /// The connection is fully closed.
    Closed,
}

/// The non-blocking connection contract consumed by [`crate::service::ServiceHandler`].
///
/// Every method is synchronous and non-blocking: implementations queue work
/// for the reactor (out of scope here) rather than performing I/O inline.
pub trait Connection: Send + Sync {
    /// Returns the connection-scoped attribute bag.
    fn context(&self) -> &std::sync::Mutex<Context>;

    /// Submits a response head (and, implicitly, opens payload streaming if
    /// the response carries an entity). Mirrors `Connection::submitResponse`.
    fn submit_response(&self, response: &Response<()>) -> io::Result<()>;

    /// Suspends further `input_ready` notifications until `request_input` is called.
    fn suspend_input(&self);

    /// Re-arms `input_ready` notifications, e.g. to begin the next exchange.
    fn request_input(&self);

    /// Requests an `output_ready` notification once the connection can accept
    /// more response bytes without blocking.
    fn request_output(&self);

    /// Gracefully closes the connection, allowing in-flight I/O to drain.
    fn close(&self);

    /// Immediately and unconditionally terminates the connection.
    fn shutdown(&self);

    /// Sets the idle-socket timeout, in milliseconds.
    fn set_socket_timeout(&self, millis: u64);

    /// Returns the current lifecycle status of the connection.
    fn status(&self) -> ConnStatus;

    /// True once a response head has been submitted for the current exchange.
    fn is_response_submitted(&self) -> bool;
}

/// The decoder handed to [`crate::service::ServiceHandler::input_ready`] /
/// [`crate::handler::RequestConsumer::consume_content`].
///
/// A pull-based contract rather than a buffer-oriented `Decoder` over
/// `BytesMut`: the consumer asks for bytes and is told when the entity is
/// fully received, instead of being handed a frame to parse itself.
pub trait ContentDecoder {
    /// Reads as many bytes as are currently available into `dst`, returning
    /// the number of bytes read (`0` means no data is available right now,
    /// not necessarily completion — check [`Self::is_completed`]).
    fn read(&mut self, dst: &mut dyn FnMut(&[u8])) -> io::Result<usize>;

    /// True once the entity has been fully decoded.
    fn is_completed(&self) -> bool;
}

/// The encoder handed to [`crate::service::ServiceHandler::output_ready`] /
/// [`crate::handler::ResponseProducer::produce_content`].
pub trait ContentEncoder {
    /// Writes `src` to the connection's output buffer, returning the number
    /// of bytes accepted (a short write means the connection's buffer is
    /// full; the producer should retry on the next `output_ready`).
    fn write(&mut self, src: &[u8]) -> io::Result<usize>;

    /// Signals that the producer has no more data; the encoder finalizes
    /// any framing (e.g. the final chunked `0\r\n\r\n`).
    fn complete(&mut self) -> io::Result<()>;

    /// True once the entity has been fully written, including framing.
    fn is_completed(&self) -> bool;
}
