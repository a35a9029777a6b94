//! Modifier engine: named value transforms referenced via compound keys.
//!
//! Cassette authors may store a field under a compound key such as
//! `body|jsonStringify|toBase64`: the on-disk value is the readable decoded
//! form, and the named modifiers produce the wire form when the cassette is
//! loaded. Compound keys are parsed into [`ModKey`] at the boundary so the
//! string convention does not leak through the core.

use serde_json::{Map, Value};
use tracing::warn;

use crate::options::ModifierMap;

/// A compound key parsed into its base field and modifier chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModKey {
    /// The plain field name the transformed value is stored under.
    pub base: String,
    /// Modifier names, applied left to right.
    pub chain: Vec<String>,
}

impl ModKey {
    /// Parses `base|mod1|mod2`; returns `None` for keys without modifiers.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split('|');
        let base = parts.next()?.to_string();
        let chain: Vec<String> = parts.map(str::to_string).collect();
        if chain.is_empty() {
            None
        } else {
            Some(Self { base, chain })
        }
    }

    /// Serializes back to the on-disk compound-key string.
    #[must_use]
    pub fn to_key(&self) -> String {
        let mut key = self.base.clone();
        for name in &self.chain {
            key.push('|');
            key.push_str(name);
        }
        key
    }
}

/// Applies registered modifiers throughout a JSON tree, producing the wire
/// form. Compound keys whose chain is fully registered are transformed and
/// renamed to their base; if any modifier in a chain is unknown, a warning
/// is emitted and the key is left unprocessed (no partial transforms).
///
/// A tree without compound keys is returned unchanged.
#[must_use]
pub fn apply(tree: &Value, registry: &ModifierMap) -> Value {
    match tree {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let processed = apply(value, registry);
                match ModKey::parse(key) {
                    Some(mod_key)
                        if mod_key.chain.iter().all(|name| registry.contains_key(name)) =>
                    {
                        let mut current = processed;
                        for name in &mod_key.chain {
                            current = registry[name].as_ref()(&current);
                        }
                        out.insert(mod_key.base, current);
                    }
                    Some(mod_key) => {
                        let unknown: Vec<&str> = mod_key
                            .chain
                            .iter()
                            .filter(|name| !registry.contains_key(*name))
                            .map(String::as_str)
                            .collect();
                        warn!(key = %key, unknown = ?unknown, "unknown modifier, key left unprocessed");
                        out.insert(key.clone(), processed);
                    }
                    None => {
                        out.insert(key.clone(), processed);
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| apply(v, registry)).collect()),
        other => other.clone(),
    }
}

/// Rebuilds the on-disk form of a subtree after its wire value was replaced.
///
/// Walks the original disk tree: each compound-keyed field whose wire value
/// is unchanged between `expected` (the old wire form) and `actual` (the new
/// live value) keeps its compound key and decoded disk value. Fields whose
/// value diverged keep the plain key with the new live value — the modifier
/// annotation is stale and is intentionally dropped.
#[must_use]
pub fn restore(disk: &Value, expected: &Value, actual: &Value) -> Value {
    let Value::Object(disk_map) = disk else {
        return actual.clone();
    };
    let mut out = match actual {
        Value::Object(map) => map.clone(),
        other => return other.clone(),
    };

    for (key, disk_value) in disk_map {
        if let Some(mod_key) = ModKey::parse(key) {
            let expected_child = expected.get(&mod_key.base);
            let actual_child = actual.get(&mod_key.base);
            let comparable = !expected_child.is_some_and(Value::is_object)
                && !actual_child.is_some_and(Value::is_object);
            if comparable && expected_child == actual_child {
                out.remove(&mod_key.base);
                out.insert(key.clone(), disk_value.clone());
            }
        } else if disk_value.is_object() && out.get(key).is_some_and(Value::is_object) {
            let nested = restore(
                disk_value,
                expected.get(key).unwrap_or(&Value::Null),
                actual.get(key).unwrap_or(&Value::Null),
            );
            out.insert(key.clone(), nested);
        }
    }
    Value::Object(out)
}

/// Adopts a new live value into a field of an on-disk entry, keeping
/// modifier annotations for unchanged values.
///
/// Handles the field itself being compound-keyed (`body|toBase64`): when the
/// wire value is unchanged the annotated field is left untouched, otherwise
/// the compound key is replaced by the plain field holding the live value.
pub fn adopt_field(entry: &mut Value, field: &str, expected_wire: Option<&Value>, actual: &Value) {
    let Value::Object(map) = entry else {
        return;
    };
    let compound = map
        .keys()
        .find(|key| ModKey::parse(key).is_some_and(|mk| mk.base == field))
        .cloned();
    if let Some(key) = compound {
        if expected_wire == Some(actual) {
            return;
        }
        map.remove(&key);
        map.insert(field.to_string(), actual.clone());
        return;
    }
    let updated = match map.get(field) {
        Some(disk_value) => restore(
            disk_value,
            expected_wire.unwrap_or(&Value::Null),
            actual,
        ),
        None => actual.clone(),
    };
    map.insert(field.to_string(), updated);
}
