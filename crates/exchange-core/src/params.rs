//! Default-parameter overlay: "apply the server's own defaults under the
//! message's own parameters" (component design §4.1 step 2, §4.2 step 2).
//!
//! Only `Server` and `Date` are overlaid here — never overwriting a value the
//! request/response already carries. The `Date` header is produced by a
//! background-refreshed [`DateService`], generalizing the teacher crate's
//! `date` module (`crates/web/src/date`) from a response-only wrapper to the
//! overlay step both the request and response paths apply.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, Response, header::{DATE, SERVER}};
use once_cell::sync::Lazy;

/// Maintains and periodically refreshes the current HTTP-date string, so
/// formatting it is not on the hot path of every response.
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    handle: tokio::task::JoinHandle<()>,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::with_update_interval(Duration::from_millis(800)));

impl DateService {
    /// Returns the process-wide singleton instance.
    pub fn global() -> &'static DateService {
        &DATE_SERVICE
    }

    fn with_update_interval(update_interval: Duration) -> Self {
        let mut buf = faf_http_date::get_date_buff_no_key();
        faf_http_date::get_date_no_key(&mut buf);
        let current = Arc::new(ArcSwap::from_pointee(Bytes::from_owner(buf)));
        let background = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(update_interval).await;
                let mut buf = faf_http_date::get_date_buff_no_key();
                faf_http_date::get_date_no_key(&mut buf);
                background.store(Arc::new(Bytes::from_owner(buf)));
            }
        });

        Self { current, handle }
    }

    /// The current RFC 7231 HTTP-date value.
    pub fn current(&self) -> HeaderValue {
        let bytes = self.current.load().as_ref().clone();
        // SAFETY: `bytes` was produced by `faf_http_date`, which always
        // yields a valid `field-value` token sequence.
        unsafe { HeaderValue::from_maybe_shared_unchecked(bytes) }
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Applies the server's default headers under whatever the message already carries.
#[derive(Debug, Clone)]
pub struct DefaultParameters {
    server: HeaderValue,
}

impl Default for DefaultParameters {
    fn default() -> Self {
        Self { server: HeaderValue::from_static(concat!("exchange-core/", env!("CARGO_PKG_VERSION"))) }
    }
}

impl DefaultParameters {
    /// Creates an overlay advertising `server` as the `Server:` header value.
    pub fn new(server: HeaderValue) -> Self {
        Self { server }
    }

    /// Overlays `Server` and `Date` onto `response`, never overwriting values
    /// the handler already set. Implements component design §4.2 step 2.
    pub fn apply<T>(&self, response: &mut Response<T>) {
        self.apply_headers(response.headers_mut());
    }

    /// Overlays `Server` and `Date` onto `request`, never overwriting values
    /// the request already carries. Implements component design §4.1 step 2
    /// ("apply the server's default parameters under the request's own
    /// parameters") — the same defaults-overlay, applied to the other
    /// message direction.
    pub fn apply_request<T>(&self, request: &mut Request<T>) {
        self.apply_headers(request.headers_mut());
    }

    fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.entry(SERVER).or_insert_with(|| self.server.clone());
        headers.entry(DATE).or_insert_with(|| DateService::global().current());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    // `DefaultParameters::apply` reads `DateService::global()`, which lazily
    // spawns its refresh task onto the ambient Tokio runtime on first access —
    // these need an actual runtime in place, unlike a plain `#[test]`.

    #[tokio::test]
    async fn overlay_does_not_replace_existing_server_header() {
        let params = DefaultParameters::default();
        let mut response =
            Response::builder().status(StatusCode::OK).header(SERVER, "custom/1.0").body(()).unwrap();

        params.apply(&mut response);

        assert_eq!(response.headers().get(SERVER).unwrap(), "custom/1.0");
        assert!(response.headers().get(DATE).is_some());
    }

    #[tokio::test]
    async fn overlay_adds_both_headers_when_absent() {
        let params = DefaultParameters::default();
        let mut response = Response::builder().status(StatusCode::OK).body(()).unwrap();

        params.apply(&mut response);

        assert!(response.headers().get(SERVER).is_some());
        assert!(response.headers().get(DATE).is_some());
    }

    #[tokio::test]
    async fn apply_request_overlays_the_same_headers_on_a_request() {
        let params = DefaultParameters::default();
        let mut request = Request::builder().header(SERVER, "upstream/9").body(()).unwrap();

        params.apply_request(&mut request);

        assert_eq!(request.headers().get(SERVER).unwrap(), "upstream/9");
        assert!(request.headers().get(DATE).is_some());
    }
}
