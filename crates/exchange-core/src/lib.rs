//! The non-blocking HTTP/1.x exchange state machine.
//!
//! This crate sequences one HTTP request/response exchange at a time on a
//! persistent, non-blocking connection. It mediates between a low-level
//! connection that delivers I/O readiness events (the [`connection::Connection`]
//! contract) and user-supplied asynchronous request handlers
//! ([`handler::RequestHandler`]), honoring HTTP/1.1 semantics such as
//! `Expect: 100-continue`, keep-alive, and `HEAD`/`204`/`304`/`205` body
//! suppression.
//!
//! # Architecture
//!
//! - [`exchange`]: the per-connection [`exchange::Exchange`] record and its phase.
//! - [`trigger`]: the one-shot [`trigger::ResponseTrigger`] a handler uses to submit
//!   its response asynchronously.
//! - [`error`]: the error taxonomy and the [`error::ErrorMapper`] that turns
//!   exceptional conditions into well-formed error responses.
//! - [`handler`]: the [`handler::RequestHandler`]/[`handler::RequestConsumer`]/
//!   [`handler::ResponseProducer`] contracts.
//! - [`connection`]: the [`connection::Connection`] contract and the
//!   [`connection::ContentDecoder`]/[`connection::ContentEncoder`] byte contracts.
//! - [`resolver`]: the [`resolver::HandlerResolver`] contract and
//!   [`resolver::NullRequestHandler`].
//! - [`processor`]: the request/response interceptor chain contract.
//! - [`reuse`]: the connection-reuse policy contract and its default.
//! - [`params`]: default-parameter overlay (`Server`/`Date` headers).
//! - [`service`]: the [`service::ServiceHandler`] state machine tying it all together.
//!
//! Deliberately out of scope: the TCP/TLS reactor and byte-level HTTP parsing
//! (owned by whatever implements [`connection::Connection`]), the handler
//! registry beyond [`resolver::HandlerResolver`]'s contract, pipelining,
//! TLS, and HTTP/2.

pub mod connection;
pub mod context;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod params;
pub mod processor;
pub mod resolver;
pub mod reuse;
pub mod service;
pub mod trigger;
