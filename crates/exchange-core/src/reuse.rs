//! The policy deciding whether a connection is kept alive after a response.

use http::{HeaderMap, Version, header::CONNECTION};

use crate::context::Context;

/// Decides whether a connection should be kept alive after the current
/// response has been fully sent.
#[cfg_attr(test, mockall::automock)]
pub trait ReuseStrategy: Send + Sync {
    /// Returns `true` if the connection should be kept open for another
    /// exchange, `false` if it should be closed once the response is sent.
    fn keep_alive(&self, response: &http::Response<()>, context: &Context) -> bool;
}

/// The obvious default: HTTP/1.1 connections are kept alive unless the
/// response (or, per the `Connection` header convention, the request) asked
/// for `Connection: close`; HTTP/1.0 and older connections are closed unless
/// they explicitly asked for `Connection: keep-alive`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultReuseStrategy;

impl DefaultReuseStrategy {
    fn connection_token(headers: &HeaderMap, token: &str) -> bool {
        headers
            .get(CONNECTION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.split(',').any(|part| part.trim().eq_ignore_ascii_case(token)))
    }
}

impl ReuseStrategy for DefaultReuseStrategy {
    fn keep_alive(&self, response: &http::Response<()>, _context: &Context) -> bool {
        let headers = response.headers();

        if Self::connection_token(headers, "close") {
            return false;
        }

        match response.version() {
            Version::HTTP_11 | Version::HTTP_2 | Version::HTTP_3 => true,
            _ => Self::connection_token(headers, "keep-alive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    fn response(version: Version, connection: Option<&str>) -> Response<()> {
        let mut builder = Response::builder().status(StatusCode::OK).version(version);
        if let Some(value) = connection {
            builder = builder.header(CONNECTION, value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn http11_defaults_to_keep_alive() {
        let strategy = DefaultReuseStrategy;
        let ctx = Context::new();
        assert!(strategy.keep_alive(&response(Version::HTTP_11, None), &ctx));
    }

    #[test]
    fn http11_connection_close_overrides() {
        let strategy = DefaultReuseStrategy;
        let ctx = Context::new();
        assert!(!strategy.keep_alive(&response(Version::HTTP_11, Some("close")), &ctx));
    }

    #[test]
    fn http10_defaults_to_close() {
        let strategy = DefaultReuseStrategy;
        let ctx = Context::new();
        assert!(!strategy.keep_alive(&response(Version::HTTP_10, None), &ctx));
    }

    #[test]
    fn http10_connection_keep_alive_overrides() {
        let strategy = DefaultReuseStrategy;
        let ctx = Context::new();
        assert!(strategy.keep_alive(&response(Version::HTTP_10, Some("keep-alive")), &ctx));
    }

    #[test]
    fn mocked_strategy_is_consulted_with_the_committed_response() {
        let mut mock = MockReuseStrategy::new();
        mock.expect_keep_alive()
            .withf(|response, _context| response.status() == StatusCode::OK)
            .times(1)
            .return_const(false);

        let ctx = Context::new();
        assert!(!mock.keep_alive(&response(Version::HTTP_11, None), &ctx));
    }
}
