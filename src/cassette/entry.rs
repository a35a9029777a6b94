//! Cassette entry: one recorded HTTP interaction.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::util::{from_hex, value_to_body_string};

/// One recorded HTTP interaction, in wire form (modifiers already applied).
///
/// Entries are uniquely identified for matching by the composite key
/// `method scope+path`; several entries may share a key when they are meant
/// to be consumed in recording order.
#[derive(Debug, Clone, Deserialize)]
pub struct CassetteEntry {
    /// Origin of the recorded request (`proto://host:port`).
    pub scope: String,
    /// Upper-case HTTP method.
    pub method: String,
    /// Path including the query string.
    pub path: String,
    /// Expected request body; entries without one match any body.
    #[serde(default)]
    pub body: Option<Value>,
    /// Recorded response status.
    pub status: u16,
    /// Recorded response body.
    #[serde(default)]
    pub response: Option<Value>,
    /// Whether the response body is a hex-encoded binary payload.
    #[serde(default, rename = "responseIsBinary")]
    pub response_is_binary: bool,
    /// Response headers as a flat name/value list, wire order preserved.
    #[serde(default, rename = "rawHeaders")]
    pub raw_headers: Option<Vec<String>>,
    /// Response headers as a lower-cased map (record-healed entries).
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Request-header expectations: exact string or `^…$` anchored regex.
    #[serde(default)]
    pub reqheaders: Option<BTreeMap<String, String>>,
    /// Artificial delay before the response is available, in milliseconds.
    #[serde(default, rename = "delayConnection")]
    pub delay_connection: Option<u64>,
    /// Artificial delay before the body is delivered, in milliseconds.
    #[serde(default, rename = "delayBody")]
    pub delay_body: Option<u64>,
}

impl CassetteEntry {
    /// Deserializes an entry from its (modifier-applied) JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or mistyped.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        let mut entry: Self = serde_json::from_value(value.clone())?;
        entry.method = entry.method.to_ascii_uppercase();
        Ok(entry)
    }

    /// Composite matching key: `method scope+path`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{} {}{}", self.method, self.scope, self.path)
    }

    /// Response headers as wire-order pairs, from `rawHeaders` or `headers`.
    #[must_use]
    pub fn response_headers(&self) -> Vec<(String, String)> {
        if let Some(raw) = &self.raw_headers {
            return raw
                .chunks(2)
                .filter_map(|pair| match pair {
                    [name, value] => Some((name.clone(), value.clone())),
                    _ => None,
                })
                .collect();
        }
        self.headers
            .as_ref()
            .map(|headers| headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Recorded response body as bytes, honoring the binary hex encoding.
    #[must_use]
    pub fn response_body_bytes(&self) -> Vec<u8> {
        match &self.response {
            None => Vec::new(),
            Some(Value::String(s)) if self.response_is_binary => {
                from_hex(s).unwrap_or_else(|| s.clone().into_bytes())
            }
            Some(value) => value_to_body_string(value).into_bytes(),
        }
    }
}
