//! Client-level and call-level options, and how they merge.
//!
//! Every [`Options`] field is optional. A call merges the client's template
//! with its own layer: scalars from the later layer win, maps merge key by
//! key, and interceptor lists and cancellation tokens are concatenated with
//! the client's first.

use crate::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::retry::{RetryDelay, RetryPolicy};
use crate::status::StatusMatcher;
use crate::{Error, Result};
use http::header::COOKIE;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// An ordered string-keyed map used for path params, query params and cookies.
///
/// A key may be present with no value. Such entries are skipped when
/// reading and never overwrite a value from an earlier layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Option<Value>)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: Option<Value>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the value for `key`, if it has one.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Iterates entries that have a value, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.as_str(), v)))
    }

    /// Returns `true` if no entry has a value.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Overlays `other` onto `self`; valueless entries in `other` are dropped.
    pub fn merge_from(&mut self, other: &Params) {
        for (key, value) in other.iter() {
            self.set(key, Some(value.clone()));
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.set(key, Some(value.into()));
        }
        params
    }
}

/// One layer of call configuration.
///
/// The same type configures a client (its template) and a single call.
///
/// # Examples
///
/// ```
/// use fetchwrap::Options;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), fetchwrap::Error> {
/// let options = Options::new()
///     .query("page", 2)
///     .param("id", "42")
///     .header("accept", "application/json")?
///     .timeout(Duration::from_secs(5))
///     .retry(3);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Options {
    base_url: Option<String>,
    params: Params,
    query: Params,
    headers: HeaderMap,
    cookies: Params,
    parse: Option<bool>,
    timeout: Option<Duration>,
    timeout_reset: Option<bool>,
    retry: Option<usize>,
    retry_delay: Option<RetryDelay>,
    retry_status: Option<StatusMatcher>,
    status: Option<StatusMatcher>,
    before: Vec<Arc<dyn RequestInterceptor>>,
    after: Vec<Arc<dyn ResponseInterceptor>>,
    signals: Vec<CancellationToken>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("base_url", &self.base_url)
            .field("params", &self.params)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("parse", &self.parse)
            .field("timeout", &self.timeout)
            .field("timeout_reset", &self.timeout_reset)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("retry_status", &self.retry_status)
            .field("status", &self.status)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("signals", &self.signals.len())
            .finish()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the URL that relative paths resolve against.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets a `{name}` path template value.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.set(name, Some(value.into()));
        self
    }

    /// Sets a query parameter. Objects and arrays are sent as JSON.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.set(key, Some(value.into()));
        self
    }

    /// Mutable access to the path params, for entries with no value.
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Mutable access to the query params, for entries with no value.
    pub fn query_mut(&mut self) -> &mut Params {
        &mut self.query
    }

    /// Sets a header, replacing earlier values for the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets a cookie sent in the merged `cookie` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair cannot appear in a header.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();
        HeaderValue::try_from(format!("{}={}", name, value))
            .map_err(|e| Error::ConfigurationError(format!("Invalid cookie: {}", e)))?;
        self.cookies.set(name, Some(Value::String(value)));
        Ok(self)
    }

    /// Decode response bodies by content type (`true`, the default) or hand
    /// back the unread body.
    pub fn parse(mut self, parse: bool) -> Self {
        self.parse = Some(parse);
        self
    }

    /// Aborts the call once `timeout` elapses.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Restart the timeout window before every attempt instead of spanning
    /// all of them.
    pub fn timeout_reset(mut self, reset: bool) -> Self {
        self.timeout_reset = Some(reset);
        self
    }

    /// Number of additional attempts after the first.
    pub fn retry(mut self, retries: usize) -> Self {
        self.retry = Some(retries);
        self
    }

    /// Sets the waits between attempts. The last one repeats.
    pub fn retry_delay(mut self, delay: RetryDelay) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Statuses that may be retried. See [`StatusMatcher`].
    pub fn retry_status(mut self, rules: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status = Some(StatusMatcher::new(rules));
        self
    }

    /// Statuses that count as success. See [`StatusMatcher`].
    pub fn status(mut self, rules: impl IntoIterator<Item = u16>) -> Self {
        self.status = Some(StatusMatcher::new(rules));
        self
    }

    /// Adds a request interceptor.
    pub fn before<I>(mut self, interceptor: I) -> Self
    where
        I: RequestInterceptor + 'static,
    {
        self.before.push(Arc::new(interceptor));
        self
    }

    /// Adds a response interceptor.
    pub fn after<I>(mut self, interceptor: I) -> Self
    where
        I: ResponseInterceptor + 'static,
    {
        self.after.push(Arc::new(interceptor));
        self
    }

    /// Adds a token that aborts the call when cancelled.
    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.signals.push(token);
        self
    }

    /// Builds options from deserialized [`Settings`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid headers, cookies or an empty
    /// retry delay list.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let mut options = Options::new();
        options.base_url = settings.base_url;
        options.parse = settings.parse;
        options.timeout = settings.timeout_ms.map(Duration::from_millis);
        options.timeout_reset = settings.timeout_reset;
        options.retry = settings.retry;
        options.retry_delay = settings
            .retry_delay_ms
            .map(RetryDelay::from_millis)
            .transpose()?;
        options.retry_status = settings.retry_status.map(StatusMatcher::new);
        options.status = settings.status.map(StatusMatcher::new);
        options.params = settings.params.into_iter().collect();
        options.query = settings.query.into_iter().collect();
        for (name, value) in settings.headers {
            options = options.header(name, value)?;
        }
        for (name, value) in settings.cookies {
            options = options.cookie(name, value)?;
        }
        Ok(options)
    }

    /// Merges layers left to right into the options for one call.
    pub fn merge<'a>(layers: impl IntoIterator<Item = &'a Options>) -> EffectiveOptions {
        let mut merged = Options::new();
        let mut cookies = Params::new();

        for layer in layers {
            merged.base_url = layer.base_url.clone().or(merged.base_url);
            merged.parse = layer.parse.or(merged.parse);
            merged.timeout = layer.timeout.or(merged.timeout);
            merged.timeout_reset = layer.timeout_reset.or(merged.timeout_reset);
            merged.retry = layer.retry.or(merged.retry);
            merged.retry_delay = layer.retry_delay.clone().or(merged.retry_delay);
            merged.retry_status = layer.retry_status.clone().or(merged.retry_status);
            merged.status = layer.status.clone().or(merged.status);

            merged.params.merge_from(&layer.params);
            merged.query.merge_from(&layer.query);
            for name in layer.headers.keys() {
                merged.headers.remove(name);
                for value in layer.headers.get_all(name) {
                    merged.headers.append(name.clone(), value.clone());
                }
            }

            let mut layer_cookies = layer
                .headers
                .get(COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(parse_cookie_header)
                .unwrap_or_default();
            layer_cookies.merge_from(&layer.cookies);
            cookies.merge_from(&layer_cookies);

            merged.before.extend(layer.before.iter().cloned());
            merged.after.extend(layer.after.iter().cloned());
            merged.signals.extend(layer.signals.iter().cloned());
        }

        merged.headers.remove(COOKIE);
        if !cookies.is_empty() {
            let header = serialize_cookies(&cookies);
            match HeaderValue::try_from(header) {
                Ok(value) => {
                    merged.headers.insert(COOKIE, value);
                }
                Err(e) => tracing::warn!(error = %e, "Dropping unrepresentable cookie header"),
            }
        }

        EffectiveOptions {
            base_url: merged.base_url,
            params: merged.params,
            query: merged.query,
            headers: merged.headers,
            parse: merged.parse.unwrap_or(true),
            retry: RetryPolicy {
                retries: merged.retry.unwrap_or(0),
                delay: merged.retry_delay.unwrap_or_default(),
                statuses: merged.retry_status.unwrap_or_else(StatusMatcher::retryable),
                timeout: merged.timeout,
                timeout_reset: merged.timeout_reset.unwrap_or(false),
            },
            status: merged.status.unwrap_or_else(StatusMatcher::success),
            before: merged.before,
            after: merged.after,
            signals: merged.signals,
        }
    }
}

/// Options for one call after merging, with defaults filled in.
#[derive(Clone)]
pub struct EffectiveOptions {
    pub base_url: Option<String>,
    pub params: Params,
    pub query: Params,
    /// Merged headers, cookies folded into a single `cookie` header.
    pub headers: HeaderMap,
    pub parse: bool,
    pub retry: RetryPolicy,
    pub status: StatusMatcher,
    pub before: Vec<Arc<dyn RequestInterceptor>>,
    pub after: Vec<Arc<dyn ResponseInterceptor>>,
    pub signals: Vec<CancellationToken>,
}

fn parse_cookie_header(header: &str) -> Params {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn serialize_cookies(cookies: &Params) -> String {
    cookies
        .iter()
        .map(|(name, value)| match value {
            Value::String(s) => format!("{}={}", name, s),
            other => format!("{}={}", name, other),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Deserializable configuration, e.g. loaded from a JSON file.
///
/// Map-valued fields are applied in key order.
///
/// # Examples
///
/// ```
/// use fetchwrap::{Options, Settings};
///
/// let settings: Settings = serde_json::from_str(r#"{
///     "base_url": "https://api.example.com",
///     "timeout_ms": 5000,
///     "retry": 2,
///     "headers": { "accept": "application/json" }
/// }"#).unwrap();
/// let options = Options::from_settings(settings).unwrap();
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub timeout_reset: Option<bool>,
    pub retry: Option<usize>,
    pub retry_delay_ms: Option<Vec<u64>>,
    pub retry_status: Option<Vec<u16>>,
    pub status: Option<Vec<u16>>,
    pub parse: Option<bool>,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, Value>,
    pub cookies: BTreeMap<String, String>,
    pub params: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_last_wins() {
        let client = Options::new()
            .base_url("http://a")
            .timeout(Duration::from_secs(1))
            .retry(2);
        let call = Options::new().retry(5);

        let merged = Options::merge([&client, &call]);
        assert_eq!(merged.base_url.as_deref(), Some("http://a"));
        assert_eq!(merged.retry.timeout, Some(Duration::from_secs(1)));
        assert_eq!(merged.retry.retries, 5);
    }

    #[test]
    fn test_defaults() {
        let merged = Options::merge([&Options::new()]);
        assert!(merged.parse);
        assert_eq!(merged.retry.retries, 0);
        assert_eq!(merged.retry.timeout, None);
        assert!(!merged.retry.timeout_reset);
        assert_eq!(merged.retry.delay, RetryDelay::default());
        assert_eq!(merged.retry.statuses.rules(), &[408, 425, 429, 5]);
        assert_eq!(merged.status.rules(), &[2]);
    }

    #[test]
    fn test_maps_merge_per_key() {
        let client = Options::new()
            .query("a", 1)
            .query("b", "x")
            .header("x-one", "1")
            .unwrap()
            .header("x-shared", "client")
            .unwrap();
        let mut call = Options::new().query("b", "y").header("x-shared", "call").unwrap();
        call.query_mut().set("a", None);

        let merged = Options::merge([&client, &call]);
        assert_eq!(merged.query.get("a"), Some(&json!(1)));
        assert_eq!(merged.query.get("b"), Some(&json!("y")));
        assert_eq!(merged.headers["x-one"], "1");
        assert_eq!(merged.headers["x-shared"], "call");
    }

    #[test]
    fn test_cookie_header_and_map_merge() {
        let client = Options::new()
            .header("cookie", "session=abc; theme=dark")
            .unwrap();
        let call = Options::new()
            .cookie("theme", "light")
            .unwrap()
            .cookie("lang", "en")
            .unwrap();

        let merged = Options::merge([&client, &call]);
        assert_eq!(merged.headers.get_all(COOKIE).iter().count(), 1);
        assert_eq!(
            merged.headers[COOKIE],
            "session=abc; theme=light; lang=en"
        );
    }

    #[test]
    fn test_interceptors_and_signals_concatenate() {
        let client = Options::new()
            .before(|r: crate::Request| r)
            .signal(CancellationToken::new());
        let call = Options::new()
            .before(|r: crate::Request| r)
            .after(|r: crate::Response| r)
            .signal(CancellationToken::new());

        let merged = Options::merge([&client, &call]);
        assert_eq!(merged.before.len(), 2);
        assert_eq!(merged.after.len(), 1);
        assert_eq!(merged.signals.len(), 2);
    }

    #[test]
    fn test_from_settings() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "base_url": "https://api.example.com",
                "timeout_ms": 250,
                "retry": 3,
                "retry_delay_ms": [10, 20],
                "status": [0, 2],
                "headers": { "x-api-key": "secret" },
                "query": { "v": 2 },
                "cookies": { "sid": "1" }
            }"#,
        )
        .unwrap();
        let options = Options::from_settings(settings).unwrap();
        let merged = Options::merge([&options]);

        assert_eq!(merged.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(merged.retry.timeout, Some(Duration::from_millis(250)));
        assert_eq!(merged.retry.retries, 3);
        assert_eq!(
            merged.retry.delay.delay_for_attempt(3),
            Duration::from_millis(20)
        );
        assert!(merged.status.matches(0));
        assert_eq!(merged.headers["x-api-key"], "secret");
        assert_eq!(merged.headers[COOKIE], "sid=1");
        assert_eq!(merged.query.get("v"), Some(&json!(2)));
    }

    #[test]
    fn test_settings_empty_retry_delay_rejected() {
        let settings: Settings = serde_json::from_str(r#"{ "retry_delay_ms": [] }"#).unwrap();
        assert!(Options::from_settings(settings).is_err());
    }
}
