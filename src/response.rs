//! Response wrapper that keeps the decoded body next to the call's details.
//!
//! The [`Response`] type holds the decoded body along with the status,
//! headers, the request that produced it, and timing information.

use crate::{Error, Payload, Request, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// A response whose status passed classification.
///
/// # Type Parameters
///
/// * `T` - The body type. Calls return [`Payload`]; [`Response::json`] turns
///   it into a typed body.
///
/// # Examples
///
/// ```no_run
/// use fetchwrap::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), fetchwrap::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.get("/users/123").send_json::<User>().await?;
///
/// println!("User: {}", response.body.name);
/// println!("Request took {:?}", response.latency);
/// println!("Status: {}", response.status);
/// println!("Attempts: {}", response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Response<T = Payload> {
    /// The decoded response body.
    pub body: T,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The final URL, after any redirects the transport followed.
    pub url: Url,

    /// The request that produced this response, as sent.
    pub request: Request,

    /// Time from the first attempt until the final response arrived,
    /// including retry delays.
    pub latency: Duration,

    /// The number of attempts made. `1` means no retries were needed.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Maps the response body to a different type using the provided function.
    ///
    /// This is useful when you want to transform the body while
    /// preserving the metadata.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            body: f(self.body),
            status: self.status,
            headers: self.headers,
            url: self.url,
            request: self.request,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl Response<Payload> {
    /// Deserializes a JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns `DeserializationFailed` if the body was not decoded as JSON or
    /// does not fit `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<Response<T>> {
        let status = self.status;
        let Some(value) = self.body.as_json() else {
            let reason = format!(
                "expected a JSON body, got content type {:?}",
                self.header("content-type").unwrap_or_default()
            );
            return Err(Error::DeserializationFailed {
                raw_response: format!("{:?}", self.body),
                reason,
                status,
                request: Box::new(self.request),
            });
        };

        match T::deserialize(value) {
            Ok(data) => Ok(self.map(|_| data)),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    status = status.as_u16(),
                    "Failed to deserialize response"
                );
                Err(Error::DeserializationFailed {
                    raw_response: value.to_string(),
                    reason: e.to_string(),
                    status,
                    request: Box::new(self.request),
                })
            }
        }
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.body
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Method};
    use serde::Deserialize;
    use serde_json::json;

    fn response(body: Payload, attempts: usize) -> Response {
        let url = Url::parse("http://localhost/users/1").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Response {
            body,
            status: StatusCode::OK,
            headers,
            url: url.clone(),
            request: Request::new(Method::GET, url),
            latency: Duration::from_millis(100),
            attempts,
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
    }

    #[test]
    fn test_json_into_type() {
        let typed = response(Payload::Json(json!({"id": 1})), 1)
            .json::<User>()
            .unwrap();
        assert_eq!(typed.body, User { id: 1 });
        assert_eq!(typed.header("content-type"), Some("application/json"));
        assert!(!typed.was_retried());
    }

    #[test]
    fn test_json_mismatch_keeps_raw_value() {
        let err = response(Payload::Json(json!({"id": "x"})), 3)
            .json::<User>()
            .unwrap_err();
        assert_eq!(err.raw_response(), Some(r#"{"id":"x"}"#));
        assert_eq!(err.status(), Some(StatusCode::OK));
        assert_eq!(err.request().unwrap().url.path(), "/users/1");
    }

    #[test]
    fn test_json_on_text_body() {
        let err = response(Payload::Text("hi".to_string()), 1)
            .json::<User>()
            .unwrap_err();
        assert!(matches!(err, Error::DeserializationFailed { .. }));
    }

    #[test]
    fn test_map_keeps_metadata() {
        let mapped = response(Payload::Text("42".to_string()), 2)
            .map(|body| body.as_text().unwrap().parse::<u32>().unwrap());
        assert_eq!(mapped.body, 42);
        assert_eq!(*mapped, 42);
        assert!(mapped.was_retried());
        assert_eq!(mapped.request.url.path(), "/users/1");
    }
}
