//! Manifest text to [`ResourceObject`]s.

use serde::Deserialize;
use serde_json::Value;

use super::object::{ResourceObject, KIND_LIST};
use crate::error::{MeshError, Result};

/// Parse a multi-document YAML manifest.
///
/// Empty documents are skipped and `kind: List` documents are flattened into
/// their items. Empty text yields an empty set.
pub fn parse_manifest(text: &str) -> Result<Vec<ResourceObject>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| MeshError::Parse(e.to_string()))?;
        if value.is_null() {
            continue;
        }
        let value: Value =
            serde_json::to_value(value).map_err(|e| MeshError::Parse(e.to_string()))?;
        if value.get("kind").and_then(Value::as_str) == Some(KIND_LIST) {
            objects.extend(list_items(value)?);
        } else {
            objects.push(ResourceObject::from_value(value)?);
        }
    }
    Ok(objects)
}

/// Parse the output of `kubectl get -o yaml` for a selector query.
///
/// The document must be a `List` with an `items` sequence.
pub fn parse_list(text: &str) -> Result<Vec<ResourceObject>> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| MeshError::Parse(e.to_string()))?;
    let value: Value = serde_json::to_value(value).map_err(|e| MeshError::Parse(e.to_string()))?;
    if value.get("kind").and_then(Value::as_str) != Some(KIND_LIST) {
        return Err(MeshError::Parse(
            "`kubectl get` returned a document whose kind is not List".into(),
        ));
    }
    list_items(value)
}

fn list_items(mut list: Value) -> Result<Vec<ResourceObject>> {
    match list.get_mut("items").map(Value::take) {
        Some(Value::Array(items)) => items.into_iter().map(ResourceObject::from_value).collect(),
        Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(MeshError::Parse("List items is not a sequence".into())),
        None => Err(MeshError::Parse("List has no items".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: mesh-system
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: gateways.networking.mesh.io
spec:
  group: networking.mesh.io
---
"#;

    #[test]
    fn test_parse_multi_document() {
        let objects = parse_manifest(BASE).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].kind(), "Namespace");
        assert_eq!(objects[1].kind(), "CustomResourceDefinition");
        assert_eq!(objects[1].group(), "apiextensions.k8s.io");
    }

    #[test]
    fn test_parse_empty_manifest() {
        assert!(parse_manifest("").unwrap().is_empty());
        assert!(parse_manifest("---\n# nothing here\n---\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_flattens_list() {
        let text = r#"
apiVersion: v1
kind: List
items:
  - apiVersion: v1
    kind: ConfigMap
    metadata: {name: a, namespace: mesh-system}
  - apiVersion: v1
    kind: Secret
    metadata: {name: b, namespace: mesh-system}
"#;
        let objects = parse_manifest(text).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].kind(), "Secret");
    }

    #[test]
    fn test_parse_malformed_yaml() {
        let err = parse_manifest("kind: [unclosed").unwrap_err();
        assert!(matches!(err, MeshError::Parse(_)));
    }

    #[test]
    fn test_parse_object_without_name() {
        let err = parse_manifest("apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n").unwrap_err();
        assert!(matches!(err, MeshError::Parse(_)));
    }

    #[test]
    fn test_parse_list_requires_list_kind() {
        let err = parse_list("apiVersion: v1\nkind: ConfigMap\nmetadata: {name: x}\n").unwrap_err();
        assert!(err.to_string().contains("not List"));
    }

    #[test]
    fn test_parse_list_requires_items() {
        let err = parse_list("apiVersion: v1\nkind: List\n").unwrap_err();
        assert!(err.to_string().contains("no items"));
    }

    #[test]
    fn test_parse_list_empty_items() {
        let items = parse_list("apiVersion: v1\nkind: List\nitems: []\n").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_list_items_wrong_type() {
        let err = parse_list("apiVersion: v1\nkind: List\nitems: oops\n").unwrap_err();
        assert!(err.to_string().contains("not a sequence"));
    }
}
