//! Mesh components and the static dependencies between them.

pub mod gate;
pub mod graph;

pub use gate::{Gate, GateSet, GateSignal, SignalGuard};
pub use graph::{DependencyGraph, TreeNode};

use std::borrow::Cow;
use std::fmt;

/// Identifier of an installable unit, e.g. `Base` or `Pilot`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentName(Cow<'static, str>);

impl ComponentName {
    pub const BASE: Self = Self::from_static("Base");
    pub const PILOT: Self = Self::from_static("Pilot");
    pub const POLICY: Self = Self::from_static("Policy");
    pub const TELEMETRY: Self = Self::from_static("Telemetry");
    pub const GALLEY: Self = Self::from_static("Galley");
    pub const CITADEL: Self = Self::from_static("Citadel");
    pub const NODE_AGENT: Self = Self::from_static("NodeAgent");
    pub const CERT_MANAGER: Self = Self::from_static("CertManager");
    pub const INJECTOR: Self = Self::from_static("Injector");
    pub const INGRESS_GATEWAY: Self = Self::from_static("IngressGateway");
    pub const EGRESS_GATEWAY: Self = Self::from_static("EgressGateway");
    pub const CNI: Self = Self::from_static("Cni");
    pub const PROMETHEUS_OPERATOR: Self = Self::from_static("PrometheusOperator");
    pub const PROMETHEUS: Self = Self::from_static("Prometheus");
    pub const GRAFANA: Self = Self::from_static("Grafana");
    pub const KIALI: Self = Self::from_static("Kiali");
    pub const TRACING: Self = Self::from_static("Tracing");

    /// Every built-in component, root first.
    pub const BUILTIN: [Self; 17] = [
        Self::BASE,
        Self::PILOT,
        Self::POLICY,
        Self::TELEMETRY,
        Self::GALLEY,
        Self::CITADEL,
        Self::NODE_AGENT,
        Self::CERT_MANAGER,
        Self::INJECTOR,
        Self::INGRESS_GATEWAY,
        Self::EGRESS_GATEWAY,
        Self::CNI,
        Self::PROMETHEUS_OPERATOR,
        Self::PROMETHEUS,
        Self::GRAFANA,
        Self::KIALI,
        Self::TRACING,
    ];

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ComponentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Static parent → children declaration with a designated root.
///
/// Built once and read-only afterwards. Children keep their declared
/// order, which is also the order the dependency tree renders in.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyDeclaration {
    root: ComponentName,
    edges: Vec<(ComponentName, Vec<ComponentName>)>,
}

impl DependencyDeclaration {
    pub fn new(root: ComponentName) -> Self {
        Self {
            root,
            edges: Vec::new(),
        }
    }

    /// Declare `children` under `parent`, appending when `parent` already
    /// has children.
    pub fn with_children(
        mut self,
        parent: ComponentName,
        children: impl IntoIterator<Item = ComponentName>,
    ) -> Self {
        let children: Vec<ComponentName> = children.into_iter().collect();
        match self.edges.iter_mut().find(|(p, _)| *p == parent) {
            Some((_, existing)) => existing.extend(children),
            None => self.edges.push((parent, children)),
        }
        self
    }

    pub fn root(&self) -> &ComponentName {
        &self.root
    }

    /// Declared children of `parent`, in declaration order.
    pub fn children_of(&self, parent: &ComponentName) -> &[ComponentName] {
        self.edges
            .iter()
            .find(|(p, _)| p == parent)
            .map(|(_, c)| c.as_slice())
            .unwrap_or_default()
    }

    /// Every parent that lists `child`. One entry per declaration, so a
    /// repeated edge counts twice.
    pub fn parents_of(&self, child: &ComponentName) -> Vec<&ComponentName> {
        self.edges
            .iter()
            .flat_map(move |(p, children)| {
                children.iter().filter(move |c| *c == child).map(move |_| p)
            })
            .collect()
    }

    /// Parent → children pairs in declaration order.
    pub fn edges(&self) -> impl Iterator<Item = (&ComponentName, &[ComponentName])> {
        self.edges.iter().map(|(p, c)| (p, c.as_slice()))
    }
}

impl Default for DependencyDeclaration {
    /// `Base` is the root and every other built-in component hangs off it.
    fn default() -> Self {
        Self::new(ComponentName::BASE).with_children(
            ComponentName::BASE,
            ComponentName::BUILTIN.iter().skip(1).cloned(),
        )
    }
}
