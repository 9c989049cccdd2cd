//! Helpers for reading OTLP attributes as plain strings.
//!
//! Grouping, identity and filtering all compare attributes by their string rendering, so an
//! integer `1` and a string `"1"` are treated as the same label value.

use std::fmt::Write;

use itertools::Itertools;
use opentelemetry_proto::tonic::{
    common::v1::{any_value::Value, AnyValue, KeyValue},
    metrics::v1::ResourceMetrics,
};

/// Renders an optional attribute value as a string.
///
/// A missing value renders as the empty string.
pub fn value_as_string(value: Option<&AnyValue>) -> String {
    match value.and_then(|v| v.value.as_ref()) {
        Some(v) => render_value(v),
        None => String::new(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::StringValue(s) => s.clone(),
        Value::BoolValue(b) => b.to_string(),
        Value::IntValue(i) => i.to_string(),
        Value::DoubleValue(d) => d.to_string(),
        Value::BytesValue(bytes) => bytes.iter().fold(String::new(), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        }),
        Value::ArrayValue(array) => format!(
            "[{}]",
            array
                .values
                .iter()
                .map(|v| value_as_string(Some(v)))
                .join(",")
        ),
        Value::KvlistValue(list) => format!(
            "{{{}}}",
            list.values
                .iter()
                .map(|kv| format!("{}:{}", kv.key, value_as_string(kv.value.as_ref())))
                .join(",")
        ),
    }
}

/// Looks up an attribute by key.
pub fn find<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a KeyValue> {
    attributes.iter().find(|kv| kv.key == key)
}

/// Looks up an attribute by key and renders its value.
pub fn get_string(attributes: &[KeyValue], key: &str) -> Option<String> {
    find(attributes, key).map(|kv| value_as_string(kv.value.as_ref()))
}

/// Constructs a string-valued attribute.
pub fn string_kv(key: impl Into<String>, value: impl Into<String>) -> KeyValue {
    KeyValue {
        key: key.into(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.into())),
        }),
    }
}

/// Sets a string attribute, replacing any existing attribute with the same key.
pub fn put_string(attributes: &mut Vec<KeyValue>, key: &str, value: &str) {
    match attributes.iter_mut().find(|kv| kv.key == key) {
        Some(kv) => *kv = string_kv(key, value),
        None => attributes.push(string_kv(key, value)),
    }
}

/// The attributes of a resource, or an empty slice when the resource is absent.
pub fn resource_attributes(resource_metrics: &ResourceMetrics) -> &[KeyValue] {
    resource_metrics
        .resource
        .as_ref()
        .map(|r| r.attributes.as_slice())
        .unwrap_or_default()
}

/// Renders attributes as `(key, value)` pairs sorted by key.
///
/// When a key repeats, the last occurrence wins.
pub fn sorted_string_pairs(attributes: &[KeyValue]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(attributes.len());
    for kv in attributes {
        let value = value_as_string(kv.value.as_ref());
        match pairs.iter_mut().find(|(k, _)| *k == kv.key) {
            Some(existing) => existing.1 = value,
            None => pairs.push((kv.key.clone(), value)),
        }
    }
    pairs.sort_by(|l, r| l.0.cmp(&r.0));
    pairs
}
