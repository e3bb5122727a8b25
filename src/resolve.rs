//! URL resolution: path templates, base joining and query appending.

use crate::options::Params;
use crate::Result;
use serde_json::Value;
use url::Url;

/// Returns `true` for `scheme://...` and scheme-relative `//...` paths.
fn is_absolute(path: &str) -> bool {
    let Some(slashes) = path.find("//") else {
        return false;
    };
    if slashes == 0 {
        return true;
    }
    let Some(scheme) = path[..slashes].strip_suffix(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Replaces `{name}` placeholders with URI-encoded path params.
///
/// Placeholders with no matching param are left as written.
pub fn fill_template(path: &str, params: &Params) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match params.get(name) {
            Some(value) => out.push_str(&urlencoding::encode(&value_to_string(value))),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Resolves `path` against `base`.
///
/// Absolute and scheme-relative paths are used as given. Otherwise leading
/// slashes are dropped from `path` and it is resolved like a relative link:
/// it replaces the last segment of `base` unless `base` ends in `/`. An empty
/// path yields `base` without its trailing slashes.
///
/// # Errors
///
/// Returns `InvalidUrl` if `base` or the joined result cannot be parsed.
///
/// # Examples
///
/// ```
/// use fetchwrap::resolve::resolve;
///
/// let url = resolve("http://api.example.com/hello/", "world").unwrap();
/// assert_eq!(url.as_str(), "http://api.example.com/hello/world");
///
/// let url = resolve("http://api.example.com/hello", "world").unwrap();
/// assert_eq!(url.as_str(), "http://api.example.com/world");
/// ```
pub fn resolve(base: &str, path: &str) -> Result<Url> {
    if is_absolute(path) && !path.starts_with("//") {
        return Ok(Url::parse(path)?);
    }
    let base = Url::parse(base)?;
    if path.starts_with("//") {
        return Ok(base.join(path)?);
    }

    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
        let mut url = base;
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
        return Ok(url);
    }
    Ok(base.join(relative)?)
}

/// Appends query params after any the URL already carries.
///
/// Strings are used verbatim, objects, arrays and null are JSON-encoded and
/// other scalars are stringified.
pub fn append_query(url: &mut Url, query: &Params) {
    if query.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (key, value) in query.iter() {
        pairs.append_pair(key, &value_to_string(value));
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        // Display on a Value is its compact JSON form.
        other => other.to_string(),
    }
}
