//! Cluster resource objects as carried through an install.
//!
//! A [`ResourceObject`] exposes the identity fields the installer reads
//! (group, kind, name, namespace, labels) and keeps the rest of the body
//! opaque. Labels are held separately and merged back into
//! `metadata.labels` when the object is serialised for the executor.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{MeshError, Result};

pub const KIND_NAMESPACE: &str = "Namespace";
pub const KIND_CRD: &str = "CustomResourceDefinition";
pub const KIND_LIST: &str = "List";

/// A single parsed manifest object.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceObject {
    group: String,
    version: String,
    kind: String,
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    body: Value,
}

impl ResourceObject {
    /// Build a minimal object with no spec. Mostly useful for tests and for
    /// addressing live objects by identity.
    pub fn new(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("name".into(), Value::String(name.to_string()));
        if !namespace.is_empty() {
            metadata.insert("namespace".into(), Value::String(namespace.to_string()));
        }
        let mut body = Map::new();
        body.insert("apiVersion".into(), Value::String(api_version.to_string()));
        body.insert("kind".into(), Value::String(kind.to_string()));
        body.insert("metadata".into(), Value::Object(metadata));

        let (group, version) = split_api_version(api_version);
        Self {
            group,
            version,
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: BTreeMap::new(),
            body: Value::Object(body),
        }
    }

    /// Build from a decoded document. Requires `apiVersion`, `kind` and
    /// `metadata.name`.
    pub fn from_value(body: Value) -> Result<Self> {
        let kind = required_str(&body, "kind")?;
        let api_version = required_str(&body, "apiVersion")?;
        let metadata = body
            .get("metadata")
            .and_then(Value::as_object)
            .ok_or_else(|| MeshError::Parse(format!("{} object has no metadata", kind)))?;
        let name = metadata
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| MeshError::Parse(format!("{} object has no metadata.name", kind)))?
            .to_string();
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let labels = metadata
            .get("labels")
            .and_then(Value::as_object)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let (group, version) = split_api_version(&api_version);
        Ok(Self {
            group,
            version,
            kind,
            name,
            namespace,
            labels,
            body,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty for cluster-scoped objects or when the manifest omits it.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Insert or overwrite labels.
    pub fn add_labels<K, V>(&mut self, labels: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in labels {
            self.labels.insert(k.into(), v.into());
        }
    }

    /// `Kind/namespace/name`, or `Kind/name` for cluster-scoped objects.
    pub fn display_name(&self) -> String {
        if self.namespace.is_empty() {
            format!("{}/{}", self.kind, self.name)
        } else {
            format!("{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }

    /// Full body with the current labels written into `metadata.labels`.
    pub fn to_value(&self) -> Value {
        let mut body = self.body.clone();
        if !self.labels.is_empty() {
            if let Some(meta) = body.get_mut("metadata").and_then(Value::as_object_mut) {
                let labels = self
                    .labels
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                meta.insert("labels".into(), Value::Object(labels));
            }
        }
        body
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_value())?)
    }
}

/// Serialise objects as one multi-document YAML manifest.
pub fn to_yaml_manifest(objects: &[ResourceObject]) -> Result<String> {
    let docs = objects
        .iter()
        .map(ResourceObject::to_yaml)
        .collect::<Result<Vec<_>>>()?;
    Ok(docs.join("---\n"))
}

fn required_str(body: &Value, field: &str) -> Result<String> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MeshError::Parse(format!("object is missing {}", field)))
}

fn split_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_extracts_identity() {
        let obj = ResourceObject::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "pilot", "namespace": "mesh-system", "labels": {"app": "pilot"}},
            "spec": {"replicas": 2}
        }))
        .unwrap();
        assert_eq!(obj.group(), "apps");
        assert_eq!(obj.version(), "v1");
        assert_eq!(obj.kind(), "Deployment");
        assert_eq!(obj.name(), "pilot");
        assert_eq!(obj.namespace(), "mesh-system");
        assert_eq!(obj.labels().get("app").map(String::as_str), Some("pilot"));
        assert_eq!(obj.display_name(), "Deployment/mesh-system/pilot");
    }

    #[test]
    fn test_core_group_is_empty() {
        let obj = ResourceObject::new("v1", "Service", "mesh-system", "pilot");
        assert_eq!(obj.group(), "");
        assert_eq!(obj.version(), "v1");
    }

    #[test]
    fn test_missing_name_is_parse_error() {
        let err = ResourceObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {}
        }))
        .unwrap_err();
        assert!(matches!(err, MeshError::Parse(_)));
        assert!(err.to_string().contains("metadata.name"));
    }

    #[test]
    fn test_missing_kind_is_parse_error() {
        let err = ResourceObject::from_value(json!({"apiVersion": "v1"})).unwrap_err();
        assert!(err.to_string().contains("kind"));
    }

    #[test]
    fn test_labels_written_back_on_serialise() {
        let mut obj = ResourceObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "mesh", "labels": {"keep": "me"}},
            "data": {"k": "v"}
        }))
        .unwrap();
        obj.add_labels([("install.operator.mesh.io/component", "Pilot")]);
        let value = obj.to_value();
        assert_eq!(value["metadata"]["labels"]["keep"], "me");
        assert_eq!(
            value["metadata"]["labels"]["install.operator.mesh.io/component"],
            "Pilot"
        );
        assert_eq!(value["data"]["k"], "v");
    }

    #[test]
    fn test_yaml_manifest_joins_documents() {
        let objects = vec![
            ResourceObject::new("v1", "Namespace", "", "mesh-system"),
            ResourceObject::new("v1", "ServiceAccount", "mesh-system", "pilot"),
        ];
        let manifest = to_yaml_manifest(&objects).unwrap();
        assert_eq!(manifest.matches("---\n").count(), 1);
        assert!(manifest.contains("kind: Namespace"));
        assert!(manifest.contains("kind: ServiceAccount"));
    }
}
