//! Healing pipeline: actions taken for unmatched requests and rewrites
//! applied to matched entries.
//!
//! Unmatched requests never succeed in-flight; healing only changes what is
//! written back at release so the *next* run matches.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::options::OverwriteMap;
use crate::ports::http::{TransportRequest, TransportResponse};
use crate::ports::IdGenerator;
use crate::recorder::matcher::PendingMock;
use crate::recorder::{modifiers, sqs};
use crate::util::{convert_headers, to_hex, try_parse_json, value_to_body_string};

/// A planned cassette entry: either already materialized, or a live
/// round-trip deferred until the session is released.
pub enum CassetteAction {
    /// A finished entry ready for serialization.
    Resolved(Value),
    /// An unmatched request to be captured via a live call at release.
    Deferred(TransportRequest),
}

/// Synthesizes a minimal stub entry for an unmatched request: status 200,
/// empty response body, no live call.
#[must_use]
pub fn stub_entry(request: &TransportRequest, overwrite: &OverwriteMap) -> Value {
    let mut entry = Map::new();
    entry.insert("scope".to_string(), Value::String(request.scope()));
    entry.insert("method".to_string(), Value::String(request.method.clone()));
    entry.insert("path".to_string(), Value::String(request.path.clone()));
    if let Some(body) = &request.body {
        entry.insert("body".to_string(), try_parse_json(body));
    }
    entry.insert("status".to_string(), json!(200));
    entry.insert("response".to_string(), json!({}));
    entry.insert("responseIsBinary".to_string(), Value::Bool(false));
    if let Some(reqheaders) = synthesize_reqheaders(&request.headers, overwrite) {
        entry.insert("reqheaders".to_string(), Value::Object(reqheaders));
    }
    Value::Object(entry)
}

/// Builds an entry from a live round-trip made in record mode, keeping the
/// flat `rawHeaders` list unless headers are stripped.
#[must_use]
pub fn record_mode_entry(
    request: &TransportRequest,
    response: &TransportResponse,
    strip_headers: bool,
    overwrite: &OverwriteMap,
) -> Value {
    let mut entry = capture_entry(request, response, overwrite);
    if !strip_headers {
        let raw: Vec<Value> =
            response.raw_header_list().into_iter().map(Value::String).collect();
        entry.insert("rawHeaders".to_string(), Value::Array(raw));
    }
    Value::Object(entry)
}

/// Builds an entry from a deferred record-healing round-trip, keeping a
/// lower-cased `headers` map unless headers are stripped.
#[must_use]
pub fn record_heal_entry(
    request: &TransportRequest,
    response: &TransportResponse,
    strip_headers: bool,
    overwrite: &OverwriteMap,
) -> Value {
    let mut entry = capture_entry(request, response, overwrite);
    if !strip_headers {
        let headers = convert_headers(&response.raw_header_list());
        let map: Map<String, Value> =
            headers.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        entry.insert("headers".to_string(), Value::Object(map));
    }
    Value::Object(entry)
}

/// Common fields of a captured live interaction.
fn capture_entry(
    request: &TransportRequest,
    response: &TransportResponse,
    overwrite: &OverwriteMap,
) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("scope".to_string(), Value::String(request.scope()));
    entry.insert("method".to_string(), Value::String(request.method.clone()));
    entry.insert("path".to_string(), Value::String(request.path.clone()));
    entry.insert(
        "body".to_string(),
        try_parse_json(request.body.as_deref().unwrap_or("")),
    );
    entry.insert("status".to_string(), json!(response.status));

    let (response_value, is_binary) = match String::from_utf8(response.body.clone()) {
        Ok(text) => (try_parse_json(&text), false),
        Err(_) => (Value::String(to_hex(&response.body)), true),
    };
    entry.insert("response".to_string(), response_value);
    entry.insert("responseIsBinary".to_string(), Value::Bool(is_binary));

    if let Some(reqheaders) = synthesize_reqheaders(&request.headers, overwrite) {
        entry.insert("reqheaders".to_string(), Value::Object(reqheaders));
    }
    entry
}

/// Synthesizes `reqheaders` for a captured request.
///
/// The overwrite map is the allowlist: recording every live header would pin
/// volatile values (signatures, dates) and make the cassette brittle, so
/// only headers with a configured rule are kept, holding the rule's output.
#[must_use]
pub fn synthesize_reqheaders(
    headers: &BTreeMap<String, String>,
    overwrite: &OverwriteMap,
) -> Option<Map<String, Value>> {
    if overwrite.is_empty() {
        return None;
    }
    let mut out = Map::new();
    for (name, value) in headers {
        if let Some(rule) = overwrite.get(name) {
            out.insert(name.clone(), Value::String(rule.apply(name, value, headers)));
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Rewrites a matched entry's response through the envelope healer, then
/// restores modifier annotations for values the healing left unchanged.
pub fn heal_response(mock: &mut PendingMock, request: &TransportRequest, ids: &Arc<dyn IdGenerator>) {
    let old_wire = mock.wire.response.clone().unwrap_or(Value::Null);
    let healed = sqs::heal(
        request.body.as_deref(),
        &old_wire,
        &mock.wire.scope,
        &request.headers,
        ids.as_ref(),
    );
    modifiers::adopt_field(&mut mock.disk, "response", Some(&old_wire), &healed);
    mock.wire.response = Some(healed);
}

/// Recomputes the `content-length` entry of recorded response headers from
/// the final (possibly healed) response body length.
pub fn heal_response_headers(mock: &mut PendingMock) {
    let body_len = mock
        .wire
        .response
        .as_ref()
        .map(|value| value_to_body_string(value).len())
        .unwrap_or(0);

    if let Some(raw) = mock.wire.raw_headers.as_mut() {
        rewrite_content_length(raw, body_len);
    }
    if let Some(Value::Array(raw)) =
        mock.disk.as_object_mut().and_then(|map| map.get_mut("rawHeaders"))
    {
        let mut flat: Vec<String> = raw
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect();
        rewrite_content_length(&mut flat, body_len);
        *raw = flat.into_iter().map(Value::String).collect();
    }
}

fn rewrite_content_length(raw_headers: &mut [String], body_len: usize) {
    for pair in raw_headers.chunks_mut(2) {
        if let [name, value] = pair {
            if name.eq_ignore_ascii_case("content-length") {
                *value = body_len.to_string();
            }
        }
    }
}
