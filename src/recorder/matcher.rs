//! Matching of outbound requests against pending cassette entries.
//!
//! First match wins: the pending queue keeps original recording order, and a
//! match anywhere but the head is an out-of-order consumption. A request
//! matching a later entry consumes it permanently even when an earlier entry
//! would also have matched — tests pin this resolution order.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::cassette::CassetteEntry;
use crate::options::{HealFlags, OverwriteMap};
use crate::ports::http::TransportRequest;
use crate::recorder::modifiers;
use crate::util::{compare_urls, parse_origin, try_parse_json};

/// A not-yet-consumed cassette entry.
///
/// `disk` is the pristine on-disk form (compound keys intact) that healing
/// mutates in place; `wire` is the modifier-applied form used for matching
/// and replay.
#[derive(Debug, Clone)]
pub struct PendingMock {
    /// Position of the entry in the original cassette.
    pub idx: usize,
    /// Composite `method scope+path` key, built at load time.
    pub key: String,
    /// On-disk entry value.
    pub disk: Value,
    /// Wire-form entry.
    pub wire: CassetteEntry,
}

/// Finds the first pending entry matching the request, applying any active
/// path/body/header healing to candidates as the scan progresses.
///
/// Returns the queue position of the match.
pub fn find_match(
    pending: &mut [PendingMock],
    request: &TransportRequest,
    flags: &HealFlags,
    overwrite: &OverwriteMap,
) -> Option<usize> {
    for (pos, mock) in pending.iter_mut().enumerate() {
        if !mock.wire.method.eq_ignore_ascii_case(&request.method)
            || !scope_matches(&mock.wire.scope, request)
        {
            continue;
        }
        if flags.path {
            adopt_path(mock, &request.path);
        } else if mock.wire.path != request.path && !compare_urls(&mock.wire.path, &request.path) {
            continue;
        }
        if flags.body {
            adopt_body(mock, request.body.as_deref());
        } else if !body_matches(mock.wire.body.as_ref(), request.body.as_deref()) {
            continue;
        }
        if flags.headers {
            patch_reqheaders(mock, &request.headers, overwrite);
        } else if !reqheaders_match(mock.wire.reqheaders.as_ref(), &request.headers) {
            continue;
        }
        return Some(pos);
    }
    None
}

/// Compares a recorded scope against the request origin, normalizing
/// scheme-default ports.
fn scope_matches(scope: &str, request: &TransportRequest) -> bool {
    match parse_origin(scope) {
        Some(origin) => {
            origin.scheme == request.protocol.as_str()
                && origin.host == request.host.to_ascii_lowercase()
                && origin.port == request.port
        }
        None => scope == request.scope(),
    }
}

/// Adopts the live path into the candidate. Paths that are equivalent after
/// URL normalization adopt silently; divergent paths are overwritten.
fn adopt_path(mock: &mut PendingMock, live_path: &str) {
    if mock.wire.path == live_path {
        return;
    }
    if !compare_urls(&mock.wire.path, live_path) {
        debug!(key = %mock.key, path = %live_path, "path healing overwrote recorded path");
    }
    if let Value::Object(map) = &mut mock.disk {
        map.insert("path".to_string(), Value::String(live_path.to_string()));
    }
    mock.wire.path = live_path.to_string();
}

/// Adopts the live body into the candidate through the modifier-aware heal
/// walk. A JSON-null live body becomes the `"null"` sentinel string.
fn adopt_body(mock: &mut PendingMock, live_body: Option<&str>) {
    let parsed = match try_parse_json(live_body.unwrap_or("")) {
        Value::Null => Value::String("null".to_string()),
        other => other,
    };
    modifiers::adopt_field(&mut mock.disk, "body", mock.wire.body.as_ref(), &parsed);
    mock.wire.body = Some(parsed);
}

/// Compares a recorded body against the live body. Recorded strings compare
/// raw (covering the `"null"` sentinel); structured values compare against
/// the parsed live body.
fn body_matches(expected: Option<&Value>, live_body: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let live = live_body.unwrap_or("");
    match expected {
        Value::String(s) => s == live,
        other => serde_json::from_str::<Value>(live).is_ok_and(|parsed| parsed == *other),
    }
}

/// Checks every recorded request-header expectation against the live
/// headers: exact string, or `^…$` anchored regex.
fn reqheaders_match(
    expectations: Option<&BTreeMap<String, String>>,
    headers: &BTreeMap<String, String>,
) -> bool {
    let Some(expectations) = expectations else {
        return true;
    };
    expectations.iter().all(|(name, pattern)| {
        headers
            .get(&name.to_ascii_lowercase())
            .is_some_and(|value| header_pattern_matches(pattern, value))
    })
}

fn header_pattern_matches(pattern: &str, value: &str) -> bool {
    if pattern.starts_with('^') && pattern.ends_with('$') {
        if let Ok(re) = Regex::new(pattern) {
            return re.is_match(value);
        }
    }
    pattern == value
}

/// Patches request-header expectations that fail against the live headers,
/// running replacement values through the configured overwrite rules.
fn patch_reqheaders(
    mock: &mut PendingMock,
    headers: &BTreeMap<String, String>,
    overwrite: &OverwriteMap,
) {
    let Some(expectations) = mock.wire.reqheaders.clone() else {
        return;
    };
    for (name, pattern) in &expectations {
        let lower = name.to_ascii_lowercase();
        let Some(live_value) = headers.get(&lower) else {
            continue;
        };
        if header_pattern_matches(pattern, live_value) {
            continue;
        }
        let replacement = match overwrite.get(&lower) {
            Some(rule) => rule.apply(&lower, live_value, headers),
            None => live_value.clone(),
        };
        debug!(key = %mock.key, header = %lower, "header healing patched request expectation");
        if let Some(expectations) = mock.wire.reqheaders.as_mut() {
            expectations.insert(name.clone(), replacement.clone());
        }
        if let Some(Value::Object(reqheaders)) =
            mock.disk.as_object_mut().and_then(|map| map.get_mut("reqheaders"))
        {
            reqheaders.insert(name.clone(), Value::String(replacement));
        }
    }
}
