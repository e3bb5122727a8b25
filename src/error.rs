//! Error types for HTTP calls.
//!
//! Construction failures (bad URL, bad header, unserializable body) are
//! returned before anything is sent and carry no request. Every other error
//! carries the [`Request`] that was built; only errors raised after a
//! response arrived carry a [`Response`].

use crate::{Payload, Request, Response};
use http::StatusCode;
use std::time::Duration;

/// The main error type for HTTP calls.
///
/// # Examples
///
/// ```no_run
/// use fetchwrap::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get("/endpoint").send().await {
///     Ok(response) => println!("Success: {:?}", response.body),
///     Err(e) if e.response().is_some() => {
///         eprintln!("HTTP error {:?}: {:?}", e.status(), e.body());
///     }
///     Err(e) if e.is_timeout() => eprintln!("Timed out"),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The transport failed before a response was received.
    ///
    /// Never retried, even if retry budget remains.
    #[error("Network error: {source}")]
    Network {
        /// The request that was being sent
        request: Box<Request>,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The call's timeout elapsed before a response was received.
    #[error("Request timed out after {timeout:?}")]
    Timeout {
        /// The request that was being sent
        request: Box<Request>,
        /// The configured timeout
        timeout: Duration,
    },

    /// A caller-supplied cancellation token fired.
    #[error("Request aborted")]
    Aborted {
        /// The request that was being sent
        request: Box<Request>,
    },

    /// The final response did not match the success statuses.
    ///
    /// The response body has already been decoded.
    #[error("HTTP error {}", .response.status)]
    Status {
        /// The final response, with its request
        response: Box<Response>,
    },

    /// The body of a successful response did not match its content type.
    ///
    /// Failed responses never raise this: their undecodable body is kept as
    /// a blob in [`Error::Status`].
    ///
    /// # Fields
    ///
    /// * `raw_response` - The raw response body as a string
    /// * `reason` - Why decoding failed
    /// * `status` - The HTTP status code of the response
    /// * `request` - The request that produced the response
    #[error("Failed to decode response (status {status}): {reason}")]
    DeserializationFailed {
        /// The raw response body that failed to decode
        raw_response: String,
        /// The decoder's error message
        reason: String,
        /// The HTTP status code
        status: StatusCode,
        /// The request that produced the response
        request: Box<Request>,
    },

    /// Invalid configuration was provided.
    ///
    /// This indicates a problem with how the client or request was configured,
    /// such as an invalid header value or a missing base URL.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns the request this error happened on, if one was built.
    pub fn request(&self) -> Option<&Request> {
        match self {
            Error::Network { request, .. }
            | Error::Timeout { request, .. }
            | Error::Aborted { request }
            | Error::DeserializationFailed { request, .. } => Some(&**request),
            Error::Status { response } => Some(&response.request),
            _ => None,
        }
    }

    /// Returns the response, for errors raised after one was received.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Status { response } => Some(&**response),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetchwrap::{Error, Request};
    /// use http::{Method, StatusCode};
    /// use url::Url;
    ///
    /// let request = Request::new(Method::GET, Url::parse("http://localhost/").unwrap());
    /// let err = Error::DeserializationFailed {
    ///     raw_response: "{".to_string(),
    ///     reason: "EOF while parsing".to_string(),
    ///     status: StatusCode::OK,
    ///     request: Box::new(request),
    /// };
    /// assert_eq!(err.status(), Some(StatusCode::OK));
    ///
    /// let err = Error::ConfigurationError("no base URL".to_string());
    /// assert_eq!(err.status(), None);
    /// ```
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { response } => Some(response.status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the decoded response body if this error has one.
    pub fn body(&self) -> Option<&Payload> {
        self.response().map(|response| &response.body)
    }

    /// Returns `true` if the call's own timeout fired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns `true` if the call failed before any response arrived.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::Network { .. } | Error::Timeout { .. } | Error::Aborted { .. }
        )
    }

    /// Returns the raw response body for decode failures.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for HTTP calls.
///
/// This is a convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use url::Url;

    fn request() -> Box<Request> {
        Box::new(Request::new(
            Method::GET,
            Url::parse("http://localhost/x").unwrap(),
        ))
    }

    #[test]
    fn test_timeout_has_request_but_no_response() {
        let err = Error::Timeout {
            request: request(),
            timeout: Duration::from_millis(10),
        };
        assert!(err.is_timeout());
        assert!(err.is_network());
        assert_eq!(err.request().unwrap().url.path(), "/x");
        assert!(err.response().is_none());
        assert!(err.status().is_none());
        assert!(err.body().is_none());
    }

    #[test]
    fn test_decode_failure_keeps_request() {
        let err = Error::DeserializationFailed {
            raw_response: "<html>".to_string(),
            reason: "expected value".to_string(),
            status: StatusCode::OK,
            request: request(),
        };
        assert_eq!(err.request().unwrap().url.path(), "/x");
        assert_eq!(err.raw_response(), Some("<html>"));
        assert_eq!(err.status(), Some(StatusCode::OK));
        assert!(err.response().is_none());
        assert!(!err.is_network());
    }

    #[test]
    fn test_construction_errors_have_no_request() {
        let err: Error = Url::parse("::").unwrap_err().into();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert!(err.request().is_none());
        assert!(!err.is_network());
    }
}
