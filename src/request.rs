//! The built request handed to interceptors and the transport.

use crate::{Error, FormData, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A serialized request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Bytes sent as they are.
    Bytes(Bytes),
    /// A multipart form, framed by the transport on every attempt.
    Form(FormData),
}

impl RequestBody {
    /// The body bytes, unless the body is a form.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::Bytes(bytes) => Some(bytes),
            RequestBody::Form(_) => None,
        }
    }
}

/// A fully built request.
///
/// Interceptors receive a `Request` by value and return the one that should
/// be sent, so replacing it outright and editing it in place look the same.
///
/// # Examples
///
/// ```
/// use fetchwrap::Request;
/// use http::Method;
/// use url::Url;
///
/// let request = Request::new(Method::GET, Url::parse("https://api.example.com/users").unwrap());
/// assert_eq!(request.url.path(), "/users");
/// assert!(request.body.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// The upper-cased HTTP method.
    pub method: Method,

    /// The resolved absolute URL, query included.
    pub url: Url,

    /// Request headers. Names are always lower-case.
    pub headers: HeaderMap,

    /// The serialized body, if any.
    pub body: Option<RequestBody>,

    /// A token that aborts this request when cancelled.
    ///
    /// It is composed with the client and call level tokens and the timeout.
    pub signal: Option<CancellationToken>,
}

impl Request {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            signal: None,
        }
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Builds the transport request for one attempt.
    ///
    /// Byte bodies are reference-counted and shared by every attempt. A form
    /// is rebuilt each time and always carries the transport's
    /// `multipart/form-data` content type, since only it knows the boundary.
    pub(crate) fn to_transport(&self, client: &reqwest::Client) -> Result<reqwest::Request> {
        let mut builder = client.request(self.method.clone(), self.url.clone());
        let mut headers = self.headers.clone();
        match &self.body {
            Some(RequestBody::Bytes(bytes)) => builder = builder.body(bytes.clone()),
            Some(RequestBody::Form(form)) => {
                headers.remove(CONTENT_TYPE);
                builder = builder.multipart(form.to_multipart()?);
            }
            None => {}
        }
        builder
            .headers(headers)
            .build()
            .map_err(|e| Error::ConfigurationError(format!("Invalid request: {}", e)))
    }
}

/// Parses and upper-cases an HTTP method name.
pub(crate) fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::ConfigurationError(format!("Invalid method {:?}: {}", method, e)))
}
