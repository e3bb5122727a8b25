//! Request body encoding and content-type driven response decoding.

use bytes::Bytes;
use futures::{stream, Stream};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;

use crate::request::RequestBody;
use crate::{Error, Result};

/// Content type reported by blobs whose response carried none.
pub const OCTET_STREAM: &str = "application/octet-stream";

const JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain;charset=UTF-8";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// An outgoing request body.
///
/// JSON values are serialized and labelled `application/json`. The other
/// shapes are written as-is, the way a fetch transport would send them.
///
/// # Examples
///
/// ```
/// use fetchwrap::{Body, FormData};
/// use serde_json::json;
///
/// let json: Body = json!({ "name": "Alice" }).into();
/// let text: Body = "plain text".into();
/// let form: Body = FormData::new().text("name", "Alice").into();
/// let params = Body::params([("q", "rust"), ("page", "2")]);
/// # let _ = (json, text, form, params);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A JSON value: maps, sequences, strings, numbers, booleans or null.
    Json(Value),
    /// Plain text.
    Text(String),
    /// A pre-formed binary payload.
    Bytes(Bytes),
    /// URL-encoded key/value pairs.
    Params(Vec<(String, String)>),
    /// A multipart form.
    Form(FormData),
}

impl Body {
    /// Serializes `value` into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `SerializationFailed` if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| Error::SerializationFailed(e.to_string()))
    }

    /// Creates a URL-encoded body from key/value pairs.
    pub fn params<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Body::Params(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes.into())
    }
}

impl From<FormData> for Body {
    fn from(form: FormData) -> Self {
        Body::Form(form)
    }
}

/// One value in a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// A plain text field.
    Text(String),
    /// A file field.
    File {
        /// The file name sent with the part.
        filename: String,
        /// The part's own content type, if it declared one.
        content_type: Option<String>,
        /// The file contents.
        data: Bytes,
    },
}

/// An ordered multipart form, used both for sending and for decoded
/// `multipart/form-data` responses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, FormValue::Text(value.into()));
        self
    }

    /// Appends a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<&str>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.append(
            name,
            FormValue::File {
                filename: filename.into(),
                content_type: content_type.map(str::to_string),
                data: data.into(),
            },
        );
        self
    }

    /// Appends an entry; repeated names are kept.
    pub fn append(&mut self, name: impl Into<String>, value: FormValue) {
        self.entries.push((name.into(), value));
    }

    /// Returns the first value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Iterates the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a transport form. Called once per attempt, since a sent form
    /// is consumed.
    pub(crate) fn to_multipart(&self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in &self.entries {
            form = match value {
                FormValue::Text(text) => form.text(name.clone(), text.clone()),
                FormValue::File {
                    filename,
                    content_type,
                    data,
                } => {
                    let mut part = Part::bytes(data.to_vec()).file_name(filename.clone());
                    if let Some(content_type) = content_type {
                        part = part.mime_str(content_type).map_err(|e| {
                            Error::ConfigurationError(format!("Invalid part content type: {}", e))
                        })?;
                    }
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }

    async fn from_multipart(content_type: &str, bytes: Bytes) -> multer::Result<Self> {
        let boundary = multer::parse_boundary(content_type)?;
        let chunks = stream::once(async move { Ok::<_, Infallible>(bytes) });
        let mut multipart = multer::Multipart::new(chunks, boundary);

        let mut form = FormData::new();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(|mime| mime.to_string());
            let data = field.bytes().await?;
            let value = match filename {
                Some(filename) => FormValue::File {
                    filename,
                    content_type,
                    data,
                },
                None => FormValue::Text(String::from_utf8_lossy(&data).into_owned()),
            };
            form.append(name, value);
        }
        Ok(form)
    }
}

/// A binary body that reports its own content type.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    content_type: String,
    bytes: Bytes,
}

impl Blob {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// The content type of the response this blob was read from.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An unread response body, returned when parsing is turned off.
#[derive(Debug)]
pub struct RawBody(reqwest::Response);

impl RawBody {
    /// The body length announced by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.0.content_length()
    }

    /// Consumes the body as a stream of chunks.
    pub fn bytes_stream(self) -> impl Stream<Item = reqwest::Result<Bytes>> {
        self.0.bytes_stream()
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> reqwest::Result<Bytes> {
        self.0.bytes().await
    }
}

/// A decoded response body.
#[derive(Debug)]
pub enum Payload {
    /// `text/plain`
    Text(String),
    /// `application/json`
    Json(Value),
    /// `multipart/form-data`
    Form(FormData),
    /// `application/x-www-form-urlencoded`
    Params(Vec<(String, String)>),
    /// Any other content type.
    Blob(Blob),
    /// Parsing was turned off; the body has not been read.
    Stream(RawBody),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Payload::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&FormData> {
        match self {
            Payload::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn as_params(&self) -> Option<&[(String, String)]> {
        match self {
            Payload::Params(params) => Some(params),
            _ => None,
        }
    }

    /// Takes the unread body out of a `Stream` payload.
    pub fn into_stream(self) -> Option<RawBody> {
        match self {
            Payload::Stream(raw) => Some(raw),
            _ => None,
        }
    }
}

/// Serializes `body` for `method`, filling in a content type when none is set.
///
/// GET and HEAD never carry a body. Forms are framed by the transport, which
/// also sets their `multipart/form-data` content type and boundary.
pub(crate) fn encode(
    method: &Method,
    body: Option<Body>,
    headers: &mut HeaderMap,
) -> Result<Option<RequestBody>> {
    if *method == Method::GET || *method == Method::HEAD {
        return Ok(None);
    }
    let Some(body) = body else {
        return Ok(None);
    };

    let (bytes, content_type) = match body {
        Body::Json(value) => {
            let bytes = serde_json::to_vec(&value)
                .map_err(|e| Error::SerializationFailed(e.to_string()))?;
            (Bytes::from(bytes), Some(JSON))
        }
        Body::Text(text) => (Bytes::from(text), Some(TEXT_PLAIN)),
        Body::Bytes(bytes) => (bytes, None),
        Body::Params(pairs) => {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            (Bytes::from(encoded), Some(FORM_URLENCODED))
        }
        Body::Form(form) => return Ok(Some(RequestBody::Form(form))),
    };

    if let Some(content_type) = content_type {
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
    Ok(Some(RequestBody::Bytes(bytes)))
}

/// Why a response body could not be decoded.
#[derive(Debug)]
pub(crate) enum DecodeError {
    /// The body could not be read from the transport.
    Read(reqwest::Error),
    /// The body was read but does not match its content type.
    Invalid { raw: Bytes, reason: String },
}

/// Reads and decodes a response body according to its content type.
pub(crate) async fn decode(
    response: reqwest::Response,
    parse: bool,
) -> std::result::Result<Payload, DecodeError> {
    if !parse {
        return Ok(Payload::Stream(RawBody(response)));
    }
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await.map_err(DecodeError::Read)?;
    decode_bytes(content_type.as_deref(), bytes).await
}

pub(crate) async fn decode_bytes(
    content_type: Option<&str>,
    bytes: Bytes,
) -> std::result::Result<Payload, DecodeError> {
    let kind = content_type.unwrap_or_default().to_ascii_lowercase();

    if kind.starts_with("text/plain") {
        return Ok(Payload::Text(String::from_utf8_lossy(&bytes).into_owned()));
    }
    if kind.starts_with(JSON) {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload::Json(Value::Null));
        }
        return serde_json::from_slice(&bytes)
            .map(Payload::Json)
            .map_err(|e| DecodeError::Invalid {
                raw: bytes.clone(),
                reason: e.to_string(),
            });
    }
    if kind.starts_with("multipart/form-data") {
        return FormData::from_multipart(content_type.unwrap_or_default(), bytes.clone())
            .await
            .map(Payload::Form)
            .map_err(|e| DecodeError::Invalid {
                raw: bytes,
                reason: e.to_string(),
            });
    }
    if kind.starts_with("application/x-www-form-urlencoded") {
        let pairs = url::form_urlencoded::parse(&bytes)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        return Ok(Payload::Params(pairs));
    }

    let content_type = content_type.unwrap_or(OCTET_STREAM);
    Ok(Payload::Blob(Blob::new(content_type, bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content_type(headers: &HeaderMap) -> &str {
        headers[CONTENT_TYPE].to_str().unwrap()
    }

    fn encoded_bytes(method: Method, body: Body, headers: &mut HeaderMap) -> Bytes {
        match encode(&method, Some(body), headers).unwrap() {
            Some(RequestBody::Bytes(bytes)) => bytes,
            other => panic!("Expected a byte body, got {:?}", other),
        }
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let mut headers = HeaderMap::new();
        let bytes = encoded_bytes(Method::POST, json!({"a": [1, 2]}).into(), &mut headers);

        assert_eq!(&bytes[..], br#"{"a":[1,2]}"#);
        assert_eq!(content_type(&headers), "application/json");
    }

    #[test]
    fn test_json_body_keeps_existing_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"));
        encode(&Method::PUT, Some(json!(null).into()), &mut headers).unwrap();

        assert_eq!(content_type(&headers), "application/vnd.api+json");
    }

    #[test]
    fn test_get_and_head_drop_body() {
        for method in [Method::GET, Method::HEAD] {
            let mut headers = HeaderMap::new();
            let body = encode(&method, Some(json!({"a": 1}).into()), &mut headers).unwrap();
            assert!(body.is_none());
            assert!(headers.is_empty());
        }
    }

    #[test]
    fn test_bytes_pass_through() {
        let mut headers = HeaderMap::new();
        let bytes = encoded_bytes(Method::POST, vec![1u8, 2, 3].into(), &mut headers);
        assert_eq!(&bytes[..], &[1, 2, 3]);
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_params_body() {
        let mut headers = HeaderMap::new();
        let bytes = encoded_bytes(
            Method::POST,
            Body::params([("q", "a b"), ("n", "1")]),
            &mut headers,
        );
        assert_eq!(&bytes[..], b"q=a+b&n=1");
        assert!(content_type(&headers).starts_with("application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_form_is_left_to_the_transport() {
        let form = FormData::new().text("name", "Alice");
        let mut headers = HeaderMap::new();
        let body = encode(&Method::POST, Some(form.clone().into()), &mut headers).unwrap();

        assert_eq!(body, Some(RequestBody::Form(form)));
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_form_rejects_bad_part_content_type() {
        let form = FormData::new().file("doc", "a.txt", Some("not a mime"), vec![1u8]);
        assert!(matches!(
            form.to_multipart(),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_multipart_quoted_names() {
        let body = "--B\r\n\
                    Content-Disposition: form-data; name=\"a;b\"\r\n\r\n\
                    v\r\n\
                    --B\r\n\
                    Content-Disposition: form-data; name=\"f\"; filename=\"x;y.txt\"\r\n\
                    Content-Type: text/plain\r\n\r\n\
                    data\r\n\
                    --B--\r\n";
        let decoded = decode_bytes(Some("multipart/form-data; boundary=B"), Bytes::from(body))
            .await
            .unwrap();
        let form = decoded.as_form().unwrap();

        let entries: Vec<_> = form.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("a;b", &FormValue::Text("v".to_string())));
        assert_eq!(
            entries[1],
            (
                "f",
                &FormValue::File {
                    filename: "x;y.txt".to_string(),
                    content_type: Some("text/plain".to_string()),
                    data: Bytes::from_static(b"data"),
                }
            )
        );
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_is_invalid() {
        let result = decode_bytes(Some("multipart/form-data"), Bytes::from("--x--")).await;
        assert!(matches!(result, Err(DecodeError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_decode_dispatch() {
        let json = decode_bytes(Some("application/json; charset=utf-8"), Bytes::from("[]"))
            .await
            .unwrap();
        assert_eq!(json.as_json(), Some(&json!([])));

        let text = decode_bytes(Some("text/plain"), Bytes::from("text")).await.unwrap();
        assert_eq!(text.as_text(), Some("text"));

        let params = decode_bytes(
            Some("application/x-www-form-urlencoded"),
            Bytes::from("a=1&b=x+y"),
        )
        .await
        .unwrap();
        assert_eq!(
            params.as_params().unwrap(),
            &[
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "x y".to_string())
            ]
        );

        let jpeg = decode_bytes(Some("image/jpeg"), Bytes::from_static(&[0xff, 0xd8]))
            .await
            .unwrap();
        assert_eq!(jpeg.as_blob().unwrap().content_type(), "image/jpeg");

        let unknown = decode_bytes(None, Bytes::from_static(b"??")).await.unwrap();
        assert_eq!(unknown.as_blob().unwrap().content_type(), OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_decode_invalid_json() {
        let result = decode_bytes(Some("application/json"), Bytes::from("{nope")).await;
        match result {
            Err(DecodeError::Invalid { raw, .. }) => assert_eq!(&raw[..], b"{nope"),
            other => panic!("Expected invalid body, got {:?}", other),
        }
        let empty = decode_bytes(Some("application/json"), Bytes::new()).await.unwrap();
        assert_eq!(empty.as_json(), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let value = json!({"id": 7, "tags": ["a", "b"], "nested": {"ok": true}});
        let mut headers = HeaderMap::new();
        let bytes = encoded_bytes(Method::POST, value.clone().into(), &mut headers);
        let decoded = decode_bytes(Some(content_type(&headers)), bytes).await.unwrap();
        assert_eq!(decoded.as_json(), Some(&value));
    }
}
