//! Request and response interceptors.
//!
//! An interceptor takes the current value and returns the one the next
//! interceptor (and eventually the transport or the caller) sees. Return the
//! input unchanged to leave it alone.
//!
//! Any `Fn(Request) -> Request` closure is a [`RequestInterceptor`], and any
//! `Fn(Response) -> Response` closure is a [`ResponseInterceptor`].
//!
//! ```
//! use fetchwrap::{Options, Request};
//! use http::HeaderValue;
//!
//! let options = Options::new().before(|mut request: Request| {
//!     request
//!         .headers
//!         .insert("x-request-id", HeaderValue::from_static("abc123"));
//!     request
//! });
//! ```

use crate::{Request, Response};
use std::sync::Arc;

/// Rewrites a request once, after it is built and before the first attempt.
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: Request) -> Request;
}

/// Rewrites a successful response before it is returned.
pub trait ResponseInterceptor: Send + Sync {
    fn intercept(&self, response: Response) -> Response;
}

impl<F> RequestInterceptor for F
where
    F: Fn(Request) -> Request + Send + Sync,
{
    fn intercept(&self, request: Request) -> Request {
        self(request)
    }
}

impl<F> ResponseInterceptor for F
where
    F: Fn(Response) -> Response + Send + Sync,
{
    fn intercept(&self, response: Response) -> Response {
        self(response)
    }
}

/// Runs `value` through `interceptors` in order.
pub(crate) fn apply_request(
    interceptors: &[Arc<dyn RequestInterceptor>],
    request: Request,
) -> Request {
    interceptors
        .iter()
        .fold(request, |request, interceptor| interceptor.intercept(request))
}

pub(crate) fn apply_response(
    interceptors: &[Arc<dyn ResponseInterceptor>],
    response: Response,
) -> Response {
    interceptors
        .iter()
        .fold(response, |response, interceptor| interceptor.intercept(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Method};
    use url::Url;

    fn request() -> Request {
        Request::new(Method::GET, Url::parse("http://localhost/").unwrap())
    }

    #[test]
    fn test_request_interceptors_run_in_order() {
        let first: Arc<dyn RequestInterceptor> = Arc::new(|mut r: Request| {
            r.headers.insert("x-order", HeaderValue::from_static("first"));
            r
        });
        let second: Arc<dyn RequestInterceptor> = Arc::new(|mut r: Request| {
            let seen = r.header("x-order").unwrap_or_default().to_string();
            r.headers
                .insert("x-order", HeaderValue::try_from(format!("{}-second", seen)).unwrap());
            r
        });

        let out = apply_request(&[first, second], request());
        assert_eq!(out.header("x-order"), Some("first-second"));
    }

    #[test]
    fn test_replacing_request() {
        let replace: Arc<dyn RequestInterceptor> = Arc::new(|_old: Request| {
            Request::new(Method::DELETE, Url::parse("http://localhost/other").unwrap())
        });
        let out = apply_request(&[replace], request());
        assert_eq!(out.method, Method::DELETE);
        assert_eq!(out.url.path(), "/other");
    }

    #[test]
    fn test_no_interceptors_is_identity() {
        let out = apply_request(&[], request());
        assert_eq!(out.url.as_str(), "http://localhost/");
    }
}
