/**
 * Content-based change detection
 *
 * Decides whether an incoming representation differs in substance from the cached one.
 * Equality covers every field of the object, never identity and never a subset such as
 * the name.
 */
use k8s_openapi::serde_json::{self, Value};
use serde::Serialize;
use tracing::warn;

/// Structural equality over the full content of a resource
pub trait ContentEq {
    fn content_eq(&self, other: &Self) -> bool;
}

impl<T: PartialEq> ContentEq for T {
    fn content_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// Strategy used to compare representations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangeDetection {
    /// Compare with [`ContentEq`]
    #[default]
    Structural,
    /// Compare canonical JSON serializations (object keys sorted)
    CanonicalJson,
}

impl ChangeDetection {
    /// `true` when there is no cached entry or the content differs
    pub fn is_change<K>(self, cached: Option<&K>, incoming: &K) -> bool
    where
        K: ContentEq + Serialize,
    {
        cached.is_none_or(|cached| !self.same_content(cached, incoming))
    }

    fn same_content<K>(self, a: &K, b: &K) -> bool
    where
        K: ContentEq + Serialize,
    {
        match self {
            Self::Structural => a.content_eq(b),
            Self::CanonicalJson => match (canonical_json(a), canonical_json(b)) {
                (Some(a), Some(b)) => a == b,
                // Unserializable content counts as changed
                _ => false,
            },
        }
    }
}

/// Deterministic serialization: object keys are emitted in sorted order
pub fn canonical_json<K: Serialize>(value: &K) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(value) => Some(render_sorted(&value)),
        Err(e) => {
            warn!("Could not serialize resource for comparison: {}", e);
            None
        }
    }
}

fn render_sorted(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body = entries
                .into_iter()
                .map(|(key, value)| format!("{}:{}", Value::String(key.clone()), render_sorted(value)))
                .collect::<Vec<String>>()
                .join(",");
            format!("{{{body}}}")
        }
        Value::Array(items) => {
            let body = items.iter().map(render_sorted).collect::<Vec<String>>().join(",");
            format!("[{body}]")
        }
        scalar => scalar.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..ConfigMap::default()
        }
    }

    #[test]
    fn test_absent_entry_is_always_a_change() {
        let incoming = config_map("cm1", &[("a", "1")]);
        assert!(ChangeDetection::Structural.is_change(None, &incoming));
        assert!(ChangeDetection::CanonicalJson.is_change(None, &incoming));
    }

    #[test]
    fn test_equal_content_distinct_instances() {
        let cached = config_map("cm1", &[("a", "1"), ("b", "2")]);
        let incoming = cached.clone();
        assert!(!ChangeDetection::Structural.is_change(Some(&cached), &incoming));
        assert!(!ChangeDetection::CanonicalJson.is_change(Some(&cached), &incoming));
    }

    #[test]
    fn test_same_name_different_payload_is_a_change() {
        let cached = config_map("cm1", &[("a", "1")]);
        let incoming = config_map("cm1", &[("a", "2")]);
        assert!(ChangeDetection::Structural.is_change(Some(&cached), &incoming));
        assert!(ChangeDetection::CanonicalJson.is_change(Some(&cached), &incoming));
    }

    #[test]
    fn test_metadata_counts_as_content() {
        let cached = config_map("cm1", &[("a", "1")]);
        let mut incoming = cached.clone();
        incoming.metadata.resource_version = Some("42".to_string());
        assert!(ChangeDetection::Structural.is_change(Some(&cached), &incoming));
        assert!(ChangeDetection::CanonicalJson.is_change(Some(&cached), &incoming));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"d":[1,2],"c":null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"c":null,"d":[1,2]},"b":1}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(
            canonical_json(&a).unwrap(),
            r#"{"a":{"c":null,"d":[1,2]},"b":1}"#
        );
    }
}
