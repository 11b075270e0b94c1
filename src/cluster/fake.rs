//! In-memory cluster used by the installer tests.
//!
//! Applied objects become healthy immediately (namespaces `Active`, CRDs
//! `Established`, deployments with a fully ready current ReplicaSet). Tests
//! that need objects to converge over time seed a timeline of states; each
//! read returns the next state and the last one sticks.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::resources::REVISION_ANNOTATION;
use super::{ClusterClient, CommandOutput, ExecFlags, ManifestExecutor};
use crate::error::{MeshError, Result};
use crate::manifest::{parse_manifest, ResourceObject, LABEL_COMPONENT};

type ObjectKey = (String, String, String);

struct Timeline {
    states: Vec<Value>,
    cursor: usize,
}

impl Timeline {
    fn next(&mut self) -> Value {
        let value = self.states[self.cursor].clone();
        if self.cursor + 1 < self.states.len() {
            self.cursor += 1;
        }
        value
    }

    fn peek(&self) -> &Value {
        &self.states[self.cursor]
    }
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Timeline>,
    reads: BTreeMap<ObjectKey, usize>,
    events: Vec<String>,
    failing: Vec<String>,
    read_error: Option<String>,
}

#[derive(Default)]
pub(crate) struct FakeCluster {
    state: Mutex<State>,
}

fn key_of(value: &Value) -> ObjectKey {
    let meta = &value["metadata"];
    (
        value["kind"].as_str().unwrap_or_default().to_string(),
        meta["namespace"].as_str().unwrap_or_default().to_string(),
        meta["name"].as_str().unwrap_or_default().to_string(),
    )
}

/// Split a selector on the commas that separate terms, not the ones inside
/// `in (a,b)` value lists.
fn selector_terms(selector: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let (mut depth, mut start) = (0, 0);
    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                terms.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&selector[start..]);
    terms.into_iter().map(str::trim).filter(|t| !t.is_empty()).collect()
}

fn value_set(list: &str) -> Vec<&str> {
    list.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .collect()
}

fn labels_match(value: &Value, selector: &str) -> bool {
    let labels = &value["metadata"]["labels"];
    selector_terms(selector).into_iter().all(|term| {
        if let Some(key) = term.strip_prefix('!') {
            return labels[key].is_null();
        }
        if let Some((key, list)) = term.split_once(" notin ") {
            let label = labels[key.trim()].as_str();
            return label.map_or(true, |l| !value_set(list).contains(&l));
        }
        if let Some((key, list)) = term.split_once(" in ") {
            let label = labels[key.trim()].as_str();
            return label.is_some_and(|l| value_set(list).contains(&l));
        }
        match term.split_once('=') {
            Some((k, v)) => labels[k].as_str() == Some(v),
            None => !labels[term].is_null(),
        }
    })
}

fn selector_arg(extra_args: &[String]) -> String {
    extra_args
        .iter()
        .skip_while(|a| *a != "--selector")
        .nth(1)
        .cloned()
        .unwrap_or_default()
}

/// Healthy live state for an applied object, plus anything a controller
/// would create for it.
fn materialize(object: &ResourceObject) -> Vec<Value> {
    let mut value = object.to_value();
    match object.kind() {
        "Namespace" => {
            value["status"] = json!({"phase": "Active"});
            vec![value]
        }
        "CustomResourceDefinition" => {
            value["status"] = json!({"conditions": [
                {"type": "NamesAccepted", "status": "True"},
                {"type": "Established", "status": "True"}
            ]});
            vec![value]
        }
        "Deployment" => {
            let name = object.name().to_string();
            let uid = format!("uid-{}", name);
            let replicas = value["spec"]["replicas"].as_i64().unwrap_or(1);
            let match_labels = value["spec"]["selector"]["matchLabels"].clone();
            value["metadata"]["uid"] = json!(uid);
            value["metadata"]["annotations"] = json!({REVISION_ANNOTATION: "1"});
            let rs = json!({
                "apiVersion": "apps/v1",
                "kind": "ReplicaSet",
                "metadata": {
                    "name": format!("{}-1", name),
                    "namespace": object.namespace(),
                    "labels": match_labels,
                    "annotations": {REVISION_ANNOTATION: "1"},
                    "ownerReferences": [{"kind": "Deployment", "name": name, "uid": uid}]
                },
                "status": {"replicas": replicas, "readyReplicas": replicas}
            });
            vec![value, rs]
        }
        "Service" => {
            if value["spec"]["clusterIP"].as_str().unwrap_or_default().is_empty() {
                value["spec"]["clusterIP"] = json!("10.96.0.10");
            }
            if value["spec"]["type"] == "LoadBalancer" {
                value["status"] = json!({"loadBalancer": {"ingress": [{"ip": "203.0.113.10"}]}});
            }
            vec![value]
        }
        _ => vec![value],
    }
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seed a live object with a fixed state.
    pub(crate) fn insert(&self, value: Value) {
        self.insert_timeline(vec![value]);
    }

    /// Seed a live object whose state advances on every read.
    pub(crate) fn insert_timeline(&self, states: Vec<Value>) {
        assert!(!states.is_empty());
        let key = key_of(&states[0]);
        let mut state = self.state.lock().unwrap();
        state.objects.insert(key, Timeline { states, cursor: 0 });
    }

    /// Make every apply for `component` exit non-zero.
    pub(crate) fn fail_apply_for(&self, component: &str) {
        self.state.lock().unwrap().failing.push(component.to_string());
    }

    /// Make every get/list fail with an API error.
    pub(crate) fn fail_reads(&self, message: &str) {
        self.state.lock().unwrap().read_error = Some(message.to_string());
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub(crate) fn reads(&self, kind: &str, namespace: &str, name: &str) -> usize {
        let key = (kind.to_string(), namespace.to_string(), name.to_string());
        self.state.lock().unwrap().reads.get(&key).copied().unwrap_or(0)
    }

    pub(crate) fn contains(&self, kind: &str, namespace: &str, name: &str) -> bool {
        let key = (kind.to_string(), namespace.to_string(), name.to_string());
        self.state.lock().unwrap().objects.contains_key(&key)
    }
}

#[async_trait]
impl ManifestExecutor for FakeCluster {
    async fn apply(
        &self,
        flags: ExecFlags,
        _namespace: &str,
        manifest: &str,
        _extra_args: &[String],
    ) -> Result<CommandOutput> {
        let objects = parse_manifest(manifest)?;
        let component = objects
            .first()
            .and_then(|o| o.labels().get(LABEL_COMPONENT).cloned())
            .unwrap_or_default();
        let names: Vec<String> = objects.iter().map(|o| o.display_name()).collect();

        let mut state = self.state.lock().unwrap();
        if state.failing.contains(&component) {
            state.events.push(format!("apply-failed {}: {}", component, names.join(", ")));
            return Ok(CommandOutput::new(
                "",
                format!("error: admission webhook denied {}", component),
                Some(1),
            ));
        }
        state.events.push(format!("apply {}: {}", component, names.join(", ")));

        let mut stdout = Vec::new();
        for object in &objects {
            stdout.push(format!("{}/{} created", object.kind().to_lowercase(), object.name()));
            if flags.dry_run {
                continue;
            }
            for live in materialize(object) {
                let key = key_of(&live);
                state.objects.entry(key).or_insert(Timeline {
                    states: vec![live],
                    cursor: 0,
                });
            }
        }
        Ok(CommandOutput::new(stdout.join("\n"), "", Some(0)))
    }

    async fn delete(
        &self,
        _flags: ExecFlags,
        _namespace: &str,
        manifest: &str,
        _extra_args: &[String],
    ) -> Result<CommandOutput> {
        let objects = parse_manifest(manifest)?;
        let mut state = self.state.lock().unwrap();
        let mut stdout = Vec::new();
        for object in &objects {
            let key = (
                object.kind().to_string(),
                object.namespace().to_string(),
                object.name().to_string(),
            );
            state.objects.remove(&key);
            stdout.push(format!("{}/{} deleted", object.kind().to_lowercase(), object.name()));
        }
        let names: Vec<String> = objects.iter().map(|o| o.display_name()).collect();
        state.events.push(format!("delete {}", names.join(", ")));
        Ok(CommandOutput::new(stdout.join("\n"), "", Some(0)))
    }

    async fn get_all(
        &self,
        _namespace: &str,
        _output_format: &str,
        extra_args: &[String],
    ) -> Result<CommandOutput> {
        let selector = selector_arg(extra_args);
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("get_all {}", selector));
        let items: Vec<Value> = state
            .objects
            .values()
            .map(Timeline::peek)
            .filter(|v| labels_match(v, &selector))
            .cloned()
            .collect();
        let list = json!({"apiVersion": "v1", "kind": "List", "items": items});
        Ok(CommandOutput::new(serde_yaml::to_string(&list)?, "", Some(0)))
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get(&self, kind: &str, namespace: &str, name: &str) -> Result<Value> {
        let key = (kind.to_string(), namespace.to_string(), name.to_string());
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.read_error {
            return Err(MeshError::Cluster(message.clone()));
        }
        *state.reads.entry(key.clone()).or_default() += 1;
        match state.objects.get_mut(&key) {
            Some(timeline) => Ok(timeline.next()),
            None => Err(MeshError::Cluster(format!(
                "{} \"{}\" not found",
                kind.to_lowercase(),
                name
            ))),
        }
    }

    async fn list(&self, kind: &str, namespace: &str, selector: &str) -> Result<Vec<Value>> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.read_error {
            return Err(MeshError::Cluster(message.clone()));
        }
        let mut items = Vec::new();
        for ((k, ns, _), timeline) in state.objects.iter_mut() {
            if k != kind || (!namespace.is_empty() && ns != namespace) {
                continue;
            }
            if labels_match(timeline.peek(), selector) {
                items.push(timeline.next());
            }
        }
        Ok(items)
    }
}
