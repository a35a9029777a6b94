//! JSON, URL, and header helpers shared across the recorder.

use std::collections::BTreeMap;

use serde_json::Value;

/// Parses a string as JSON, falling back to the raw string on failure.
#[must_use]
pub fn try_parse_json(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

/// Renders a JSON value as an HTTP body string.
///
/// Strings are used verbatim; everything else is compact-serialized.
#[must_use]
pub fn value_to_body_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An origin parsed out of a cassette `scope` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// URL scheme (`http` or `https`).
    pub scheme: String,
    /// Lower-cased host name.
    pub host: String,
    /// Explicit or scheme-default port.
    pub port: u16,
}

/// Parses `proto://host[:port]` into an [`Origin`], defaulting the port
/// from the scheme. Returns `None` for anything else.
#[must_use]
pub fn parse_origin(scope: &str) -> Option<Origin> {
    let (scheme, rest) = scope.split_once("://")?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let rest = rest.trim_end_matches('/');
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().ok()?),
        None => (rest, if scheme == "https" { 443 } else { 80 }),
    };
    if host.is_empty() {
        return None;
    }
    Some(Origin {
        scheme: scheme.to_string(),
        host: host.to_ascii_lowercase(),
        port,
    })
}

/// Splits a request path into its path part and sorted query pairs.
fn normalize_path(path: &str) -> (String, Vec<(String, String)>) {
    let (base, query) = match path.split_once('?') {
        Some((base, query)) => (base, query),
        None => (path, ""),
    };
    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (p.to_string(), String::new()),
        })
        .collect();
    pairs.sort();
    (base.to_string(), pairs)
}

/// Compares two request paths for equivalence under URL normalization:
/// query-parameter order is ignored, trailing slashes are preserved.
#[must_use]
pub fn compare_urls(first: &str, second: &str) -> bool {
    if first == second {
        return true;
    }
    normalize_path(first) == normalize_path(second)
}

/// Converts a flat `rawHeaders` name/value list into a lower-cased map.
#[must_use]
pub fn convert_headers(raw: &[String]) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for pair in raw.chunks(2) {
        if let [name, value] = pair {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }
    }
    headers
}

/// Encodes bytes as a lower-case hex string.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes a lower- or upper-case hex string back into bytes.
#[must_use]
pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
