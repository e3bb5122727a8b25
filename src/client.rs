//! HTTP client running every call through one pipeline.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure a client's default options and
//! [`CallBuilder`] to add per-call options.

use crate::cancel::{AbortController, AbortReason};
use crate::codec::{self, Blob, Body, DecodeError, Payload, OCTET_STREAM};
use crate::interceptor::{self, RequestInterceptor, ResponseInterceptor};
use crate::options::{EffectiveOptions, Options};
use crate::request::parse_method;
use crate::retry::{Decision, RetryDelay, MAX_TIMEOUT};
use crate::{resolve, status, Error, Request, Response, Result};
use http::header::CONTENT_TYPE;
use http::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// An HTTP client holding default options for every call it makes.
///
/// The client is cheap to clone and designed to be reused. Its options are a
/// read-only template: each call merges its own options on top without
/// changing the client.
///
/// # Examples
///
/// ```no_run
/// use fetchwrap::{Client, Response};
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
///     email: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
///     email: String,
/// }
///
/// # async fn example() -> Result<(), fetchwrap::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry(3)
///     .build()?;
///
/// // GET request
/// let user: Response<User> = client.get("/users/{id}").param("id", 123).send_json().await?;
/// println!("User: {}", user.body.name);
///
/// // POST request
/// let new_user = CreateUser {
///     name: "Alice".to_string(),
///     email: "alice@example.com".to_string(),
/// };
/// let created: Response<User> = client.post("/users").json(&new_user).send_json().await?;
/// println!("Created user with ID: {}", created.body.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    layers: Vec<Options>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns a client whose defaults are this client's with `options`
    /// merged on top. Both share the same transport.
    pub fn with_options(&self, options: Options) -> Client {
        let mut layers = self.inner.layers.clone();
        layers.push(options);
        Client {
            inner: Arc::new(ClientInner {
                http_client: self.inner.http_client.clone(),
                layers,
            }),
        }
    }

    /// Makes an HTTP call.
    ///
    /// This is the pipeline every other method goes through: it merges
    /// options, resolves the URL, encodes the body, runs request
    /// interceptors, drives the attempt loop, decodes the body, classifies
    /// the final status and runs response interceptors.
    ///
    /// # Arguments
    ///
    /// * `method` - The HTTP method, in any case
    /// * `path` - A path relative to the base URL, or an absolute URL
    /// * `body` - Optional request body
    /// * `options` - Call-level options, merged over the client's
    ///
    /// # Errors
    ///
    /// Construction errors are returned before anything is sent. Transport
    /// failures, timeouts and aborts are returned as soon as they happen and
    /// are never retried. A final response whose status does not match the
    /// success rules is returned as [`Error::Status`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fetchwrap::{Client, Options};
    /// use serde_json::json;
    ///
    /// # async fn example() -> Result<(), fetchwrap::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let response = client
    ///     .call("post", "/search", Some(json!({ "query": "rust" }).into()), &Options::new())
    ///     .await?;
    /// println!("Results: {:?}", response.body.as_json());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call(
        &self,
        method: impl AsRef<str>,
        path: &str,
        body: Option<Body>,
        options: &Options,
    ) -> Result<Response> {
        let start_time = Instant::now();
        let method = parse_method(method.as_ref())?;
        let options = Options::merge(self.inner.layers.iter().chain(std::iter::once(options)));

        let request = build_request(method, path, body, &options)?;
        let request = interceptor::apply_request(&options.before, request);

        let policy = &options.retry;
        let mut abort = AbortController::new(
            options
                .signals
                .iter()
                .cloned()
                .chain(request.signal.clone()),
        );
        let mut attempt = 0;

        let response = loop {
            if policy.timeout_reset {
                abort.clear();
            }
            abort.sleep(policy.delay.delay_for_attempt(attempt)).await;
            abort.arm(policy.armed_timeout());

            tracing::debug!(
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1,
                "Executing HTTP request"
            );

            let transport_request = request.to_transport(&self.inner.http_client)?;
            let outcome = abort
                .guard(self.inner.http_client.execute(transport_request))
                .await;

            let response = match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(source)) => {
                    tracing::warn!(
                        error = %source,
                        attempt = attempt + 1,
                        method = %request.method,
                        url = %request.url,
                        "Request failed"
                    );
                    return Err(Error::Network {
                        request: Box::new(request),
                        source,
                    });
                }
                Err(AbortReason::Timeout) => {
                    let timeout = policy.armed_timeout().unwrap_or(MAX_TIMEOUT);
                    tracing::warn!(
                        timeout_ms = timeout.as_millis(),
                        attempt = attempt + 1,
                        url = %request.url,
                        "Request timed out"
                    );
                    return Err(Error::Timeout {
                        request: Box::new(request),
                        timeout,
                    });
                }
                Err(AbortReason::Cancelled) => {
                    tracing::debug!(url = %request.url, "Request aborted");
                    return Err(Error::Aborted {
                        request: Box::new(request),
                    });
                }
            };

            let code = response.status().as_u16();
            let classification = status::classify(code, &options.status, &policy.statuses);
            match policy.decide(classification, attempt) {
                Decision::RetryPending => {
                    attempt += 1;
                    tracing::info!(
                        status = code,
                        delay_ms = policy.delay.delay_for_attempt(attempt).as_millis(),
                        attempt = attempt,
                        "Retrying request after delay"
                    );
                }
                Decision::Succeeded | Decision::Failed => break response,
            }
        };
        abort.clear();

        let latency = start_time.elapsed();
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempt + 1,
            "Received HTTP response"
        );

        // The deadline is cleared, so only caller tokens can cut the body read short.
        let decoded = match abort.guard(codec::decode(response, options.parse)).await {
            Ok(decoded) => decoded,
            Err(_) => {
                tracing::debug!(url = %request.url, "Request aborted while reading the body");
                return Err(Error::Aborted {
                    request: Box::new(request),
                });
            }
        };

        let succeeded = options.status.matches(status.as_u16());
        let body = match decoded {
            Ok(body) => body,
            Err(DecodeError::Read(source)) => {
                return Err(Error::Network {
                    request: Box::new(request),
                    source,
                })
            }
            Err(DecodeError::Invalid { raw, reason }) if succeeded => {
                let raw_response = String::from_utf8_lossy(&raw).into_owned();
                tracing::error!(
                    error = %reason,
                    raw_response = %raw_response,
                    "Failed to decode response"
                );
                return Err(Error::DeserializationFailed {
                    raw_response,
                    reason,
                    status,
                    request: Box::new(request),
                });
            }
            Err(DecodeError::Invalid { raw, reason }) => {
                tracing::debug!(error = %reason, "Keeping undecodable error body as a blob");
                let content_type = headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or(OCTET_STREAM);
                Payload::Blob(Blob::new(content_type, raw))
            }
        };

        let response = Response {
            body,
            status,
            headers,
            url,
            request,
            latency,
            attempts: attempt + 1,
        };

        if !succeeded {
            if status.is_client_error() {
                tracing::error!(status = status.as_u16(), "Client error (4xx)");
            } else if status.is_server_error() {
                tracing::warn!(status = status.as_u16(), "Server error (5xx)");
            }
            return Err(Error::Status {
                response: Box::new(response),
            });
        }

        Ok(interceptor::apply_response(&options.after, response))
    }

    /// Starts a call with per-call options.
    ///
    /// `method` may be a [`Method`] or any string; it is upper-cased.
    pub fn request(&self, method: impl AsRef<str>, path: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder::new(self, method.as_ref().to_string(), path.into())
    }

    /// Starts a GET call.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fetchwrap::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), fetchwrap::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user = client.get("/users/123").send_json::<User>().await?;
    /// println!("User: {}", user.body.name);
    /// # Ok(())
    /// # }
    /// ```
    pub fn get(&self, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::GET, path)
    }

    /// Starts a HEAD call.
    pub fn head(&self, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::HEAD, path)
    }

    /// Starts a POST call.
    pub fn post(&self, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::POST, path)
    }

    /// Starts a PUT call.
    pub fn put(&self, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::PUT, path)
    }

    /// Starts a PATCH call.
    pub fn patch(&self, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::PATCH, path)
    }

    /// Starts a DELETE call.
    pub fn delete(&self, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::DELETE, path)
    }
}

/// Resolves the URL and encodes the body for one call.
fn build_request(
    method: Method,
    path: &str,
    body: Option<Body>,
    options: &EffectiveOptions,
) -> Result<Request> {
    let path = resolve::fill_template(path, &options.params);
    let mut url = match &options.base_url {
        Some(base) => resolve::resolve(base, &path)?,
        None => Url::parse(&path)?,
    };
    resolve::append_query(&mut url, &options.query);

    let mut headers = options.headers.clone();
    let body = codec::encode(&method, body, &mut headers)?;

    Ok(Request {
        method,
        url,
        headers,
        body,
        signal: None,
    })
}

/// Per-call options and body for one request, created by [`Client::request`]
/// and the verb helpers.
///
/// Invalid headers or unserializable bodies are reported by [`send`](Self::send).
pub struct CallBuilder<'a> {
    client: &'a Client,
    method: String,
    path: String,
    body: Option<Body>,
    options: Options,
    error: Option<Error>,
}

impl<'a> CallBuilder<'a> {
    fn new(client: &'a Client, method: String, path: String) -> Self {
        Self {
            client,
            method,
            path,
            body: None,
            options: Options::new(),
            error: None,
        }
    }

    fn try_update(mut self, update: impl FnOnce(Options) -> Result<Options>) -> Self {
        let options = std::mem::take(&mut self.options);
        match update(options) {
            Ok(options) => self.options = options,
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Replaces the call-level options set so far.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match Body::json(value) {
            Ok(body) => self.body = Some(body),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Adds a query parameter for this call.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options = self.options.query(key, value);
        self
    }

    /// Sets a `{name}` path template value for this call.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options = self.options.param(name, value);
        self
    }

    /// Sets a header for this call, replacing the client's value.
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.try_update(|options| options.header(name, value))
    }

    /// Sets a cookie for this call.
    pub fn cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.try_update(|options| options.cookie(name, value))
    }

    /// Turns content-type decoding of the response body on or off.
    pub fn parse(mut self, parse: bool) -> Self {
        self.options = self.options.parse(parse);
        self
    }

    /// Sets the timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.timeout(timeout);
        self
    }

    /// Restarts the timeout before every attempt.
    pub fn timeout_reset(mut self, reset: bool) -> Self {
        self.options = self.options.timeout_reset(reset);
        self
    }

    /// Sets how many times a retryable response is retried.
    pub fn retry(mut self, retries: usize) -> Self {
        self.options = self.options.retry(retries);
        self
    }

    /// Sets the waits between attempts.
    pub fn retry_delay(mut self, delay: RetryDelay) -> Self {
        self.options = self.options.retry_delay(delay);
        self
    }

    /// Sets which statuses may be retried.
    pub fn retry_status(mut self, rules: impl IntoIterator<Item = u16>) -> Self {
        self.options = self.options.retry_status(rules);
        self
    }

    /// Sets which statuses count as success.
    pub fn status(mut self, rules: impl IntoIterator<Item = u16>) -> Self {
        self.options = self.options.status(rules);
        self
    }

    /// Adds a request interceptor that runs after the client's.
    pub fn before<I: RequestInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.options = self.options.before(interceptor);
        self
    }

    /// Adds a response interceptor that runs after the client's.
    pub fn after<I: ResponseInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.options = self.options.after(interceptor);
        self
    }

    /// Adds a token that aborts this call when cancelled.
    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.options = self.options.signal(token);
        self
    }

    /// Sends the call and returns the decoded response.
    pub async fn send(self) -> Result<Response> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.client
            .call(&self.method, &self.path, self.body, &self.options)
            .await
    }

    /// Sends the call and deserializes the JSON body into `T`.
    pub async fn send_json<T: DeserializeOwned>(self) -> Result<Response<T>> {
        self.send().await?.json()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// Everything set here becomes the client-level layer of every call.
///
/// # Examples
///
/// ```no_run
/// use fetchwrap::{ClientBuilder, RetryDelay};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), fetchwrap::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry(3)
///     .retry_delay(RetryDelay::from_millis([100, 500, 2500])?)
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    options: Options,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            options: Options::new(),
            http_client: None,
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())?;
        self.options = self.options.base_url(url.as_str());
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        self.options = self.options.header(name, value)?;
        Ok(self)
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.timeout(timeout);
        self
    }

    /// Restarts the timeout before every attempt.
    pub fn timeout_reset(mut self, reset: bool) -> Self {
        self.options = self.options.timeout_reset(reset);
        self
    }

    /// Sets how many times a retryable response is retried.
    pub fn retry(mut self, retries: usize) -> Self {
        self.options = self.options.retry(retries);
        self
    }

    /// Sets the waits between attempts.
    pub fn retry_delay(mut self, delay: RetryDelay) -> Self {
        self.options = self.options.retry_delay(delay);
        self
    }

    /// Sets which statuses may be retried.
    pub fn retry_status(mut self, rules: impl IntoIterator<Item = u16>) -> Self {
        self.options = self.options.retry_status(rules);
        self
    }

    /// Sets which statuses count as success.
    pub fn status(mut self, rules: impl IntoIterator<Item = u16>) -> Self {
        self.options = self.options.status(rules);
        self
    }

    /// Adds a request interceptor that runs before any call-level ones.
    pub fn before<I: RequestInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.options = self.options.before(interceptor);
        self
    }

    /// Adds a response interceptor that runs before any call-level ones.
    pub fn after<I: ResponseInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.options = self.options.after(interceptor);
        self
    }

    /// Adds a token that aborts every call made through the client.
    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.options = self.options.signal(token);
        self
    }

    /// Replaces every option set so far.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Uses a preconfigured `reqwest` client as the transport.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                layers: vec![self.options],
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBody;
    use bytes::Bytes;
    use serde_json::json;

    fn effective(options: Options) -> EffectiveOptions {
        Options::merge([&options])
    }

    #[test]
    fn test_build_request_resolves_url_and_body() {
        let options = effective(
            Options::new()
                .base_url("http://api.example.com/v1/")
                .param("id", "a/b")
                .query("expand", true),
        );
        let request = build_request(
            Method::POST,
            "/users/{id}",
            Some(json!({"name": "x"}).into()),
            &options,
        )
        .unwrap();

        assert_eq!(
            request.url.as_str(),
            "http://api.example.com/v1/users/a%2Fb?expand=true"
        );
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(
            request.body.as_ref().and_then(RequestBody::as_bytes),
            Some(&Bytes::from_static(br#"{"name":"x"}"#))
        );
    }

    #[test]
    fn test_build_request_without_base_needs_absolute_path() {
        let options = effective(Options::new());
        assert!(matches!(
            build_request(Method::GET, "/relative", None, &options),
            Err(Error::InvalidUrl(_))
        ));
        let request =
            build_request(Method::GET, "http://localhost:8080/x", None, &options).unwrap();
        assert_eq!(request.url.port(), Some(8080));
    }

    #[test]
    fn test_builder_rejects_invalid_base_url() {
        assert!(matches!(
            Client::builder().base_url("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_with_options_stacks_layers() {
        let client = Client::builder().retry(1).build().unwrap();
        let derived = client.with_options(Options::new().retry(4));

        let merged = Options::merge(derived.inner.layers.iter());
        assert_eq!(merged.retry.retries, 4);
        assert_eq!(client.inner.layers.len(), 1);
    }

    #[tokio::test]
    async fn test_deferred_builder_error() {
        let client = Client::builder().build().unwrap();
        let result = client
            .get("http://localhost/")
            .header("bad header", "x")
            .send()
            .await;
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }
}
