//! Apply ordering and partitioning of a component's objects.

use super::object::{ResourceObject, KIND_CRD, KIND_NAMESPACE};

const GROUP_CORE: &str = "";
const GROUP_APIEXTENSIONS: &str = "apiextensions.k8s.io";
const GROUP_RBAC: &str = "rbac.authorization.k8s.io";
const GROUP_AUTOSCALING: &str = "autoscaling";

/// Priority used for anything not listed explicitly.
pub const DEFAULT_PRIORITY: i32 = 1000;

/// Apply priority for a kind; smaller applies first.
pub fn priority(kind: &str, group: &str) -> i32 {
    match (group, kind) {
        // CRDs are slow to establish and their instances follow soon after.
        (GROUP_APIEXTENSIONS, "CustomResourceDefinition") => -1000,
        // Accounts and roles before the bindings that reference them.
        (GROUP_CORE, "ServiceAccount") | (GROUP_RBAC, "ClusterRole") => 1,
        (GROUP_RBAC, "ClusterRoleBinding") => 2,
        // Pods mount these; creating them first avoids crash-loop backoff.
        (GROUP_CORE, "ConfigMap") | (GROUP_CORE, "Secret") => 100,
        (_, "Deployment") => DEFAULT_PRIORITY,
        (GROUP_AUTOSCALING, "HorizontalPodAutoscaler") => 1001,
        // Services last, once their pods are on the way.
        (GROUP_CORE, "Service") => 10000,
        _ => DEFAULT_PRIORITY,
    }
}

/// Stable sort by [`priority`]; equal priorities keep their input order.
pub fn sort_objects(objects: &mut [ResourceObject]) {
    objects.sort_by_key(|o| priority(o.kind(), o.group()));
}

/// Objects split into the three classes that are applied and waited on in
/// sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub namespaces: Vec<ResourceObject>,
    pub crds: Vec<ResourceObject>,
    pub others: Vec<ResourceObject>,
}

/// Split by kind, preserving relative order inside each class.
pub fn partition(objects: Vec<ResourceObject>) -> Partition {
    let mut out = Partition::default();
    for object in objects {
        match object.kind() {
            KIND_NAMESPACE => out.namespaces.push(object),
            KIND_CRD => out.crds.push(object),
            _ => out.others.push(object),
        }
    }
    out
}
