//! Typed views over the live objects the waiters inspect.
//!
//! Only the fields readiness depends on are modelled; everything else in
//! the JSON is ignored. All fields default so partially populated objects
//! (e.g. no `status` yet) still deserialise.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::ClusterClient;
use crate::error::{MeshError, Result};

pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
}

fn condition_is_true(conditions: &[Condition], type_: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.type_ == type_ && c.status == "True")
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// One `matchExpressions` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: String,
    pub values: Vec<String>,
}

impl LabelSelectorRequirement {
    /// kubectl set-based form, `None` for an unknown operator.
    fn to_selector_term(&self) -> Option<String> {
        let values = || self.values.join(",");
        match self.operator.as_str() {
            "In" => Some(format!("{} in ({})", self.key, values())),
            "NotIn" => Some(format!("{} notin ({})", self.key, values())),
            "Exists" => Some(self.key.clone()),
            "DoesNotExist" => Some(format!("!{}", self.key)),
            _ => None,
        }
    }
}

impl LabelSelector {
    /// Equality terms from `matchLabels` followed by set-based terms from
    /// `matchExpressions`.
    pub fn to_selector_string(&self) -> String {
        let mut terms: Vec<String> = self
            .match_labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        terms.extend(
            self.match_expressions
                .iter()
                .filter_map(LabelSelectorRequirement::to_selector_term),
        );
        terms.join(",")
    }
}

/// `k=v,k2=v2` from a label map.
pub fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Namespace / Pod
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Namespace {
    pub metadata: ObjectMeta,
    pub status: NamespaceStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamespaceStatus {
    pub phase: String,
}

impl Namespace {
    pub fn is_active(&self) -> bool {
        self.status.phase == "Active"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodStatus {
    pub phase: String,
    pub conditions: Vec<Condition>,
}

impl Pod {
    pub fn is_ready(&self) -> bool {
        condition_is_true(&self.status.conditions, "Ready")
    }
}

// ============================================================================
// Workloads
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeploymentSpec {
    pub replicas: Option<i32>,
    pub selector: LabelSelector,
}

impl Deployment {
    /// `spec.replicas`, which the API server defaults to 1.
    pub fn desired_replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1)
    }

    pub fn revision(&self) -> Option<&str> {
        self.metadata.annotation(REVISION_ANNOTATION)
    }

    /// Whether `rs` is owned by this deployment.
    pub fn owns(&self, rs: &ReplicaSet) -> bool {
        rs.metadata.owner_references.iter().any(|o| {
            o.kind == "Deployment"
                && if !o.uid.is_empty() && !self.metadata.uid.is_empty() {
                    o.uid == self.metadata.uid
                } else {
                    o.name == self.metadata.name
                }
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplicaSet {
    pub metadata: ObjectMeta,
    pub spec: ReplicaSetSpec,
    pub status: ReplicaSetStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplicaSetSpec {
    pub replicas: Option<i32>,
    pub selector: LabelSelector,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplicaSetStatus {
    pub replicas: i32,
    pub ready_replicas: i32,
}

/// Shape shared by DaemonSet and StatefulSet for readiness purposes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorWorkload {
    pub metadata: ObjectMeta,
    pub spec: SelectorSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorSpec {
    pub selector: LabelSelector,
}

pub type DaemonSet = SelectorWorkload;
pub type StatefulSet = SelectorWorkload;

/// ReplicationController's selector is a bare label map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplicationController {
    pub metadata: ObjectMeta,
    pub spec: ReplicationControllerSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplicationControllerSpec {
    pub selector: BTreeMap<String, String>,
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceStatus {
    pub load_balancer: LoadBalancerStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadBalancerStatus {
    pub ingress: Vec<LoadBalancerIngress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadBalancerIngress {
    pub ip: String,
    pub hostname: String,
}

impl Service {
    pub fn is_ready(&self) -> bool {
        match self.spec.type_.as_str() {
            "ExternalName" => true,
            // Headless services carry the literal "None", so only a missing
            // address means the IP is still being allocated.
            _ if self.spec.cluster_ip.is_empty() => false,
            "LoadBalancer" => self
                .status
                .load_balancer
                .ingress
                .iter()
                .any(|i| !i.ip.is_empty() || !i.hostname.is_empty()),
            _ => true,
        }
    }
}

// ============================================================================
// CustomResourceDefinition
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomResourceDefinition {
    pub metadata: ObjectMeta,
    pub status: CrdStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrdStatus {
    pub conditions: Vec<Condition>,
}

impl CustomResourceDefinition {
    pub fn is_established(&self) -> bool {
        condition_is_true(&self.status.conditions, "Established")
    }

    /// The `NamesAccepted=False` condition, if the API server rejected the
    /// CRD's names.
    pub fn names_rejected(&self) -> Option<&Condition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.type_ == "NamesAccepted" && c.status == "False")
    }
}

// ============================================================================
// Client helpers
// ============================================================================

/// Fetch one object and decode it into a typed view.
pub async fn get_as<T: DeserializeOwned>(
    client: &dyn ClusterClient,
    kind: &str,
    namespace: &str,
    name: &str,
) -> Result<T> {
    let value = client.get(kind, namespace, name).await?;
    serde_json::from_value(value)
        .map_err(|e| MeshError::Cluster(format!("decoding {} {}: {}", kind, name, e)))
}

/// List objects and decode each into a typed view.
pub async fn list_as<T: DeserializeOwned>(
    client: &dyn ClusterClient,
    kind: &str,
    namespace: &str,
    selector: &str,
) -> Result<Vec<T>> {
    client
        .list(kind, namespace, selector)
        .await?
        .into_iter()
        .map(|v| {
            serde_json::from_value(v)
                .map_err(|e| MeshError::Cluster(format!("decoding {} list: {}", kind, e)))
        })
        .collect()
}
