//! Helpers for reading the freeform payload of dynamic objects.

use std::collections::BTreeMap;

use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::Value;

use super::coords::kind_ref_of;

/// Walk a dotted path through a JSON value.
fn nested<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

/// Read a string at the given path of the object's payload.
pub fn nested_str<'a>(object: &'a DynamicObject, path: &[&str]) -> Option<&'a str> {
    nested(&object.data, path)?.as_str()
}

/// Read a string→string mapping at the given path of the object's payload.
/// Returns `None` when the path is absent or any value is not a string.
pub fn nested_string_map(object: &DynamicObject, path: &[&str]) -> Option<BTreeMap<String, String>> {
    let map = nested(&object.data, path)?.as_object()?;
    map.iter()
        .map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
        .collect()
}

/// A short human-readable description used in error messages:
/// `(namespace) kind name`.
pub fn describe(object: &DynamicObject) -> String {
    let namespace = object.namespace().unwrap_or_default();
    let kind = kind_ref_of(object)
        .map(|k| k.to_string())
        .unwrap_or_else(|| "<untyped>".to_string());
    format!("({}) {} {}", namespace, kind, object.name_any())
}
