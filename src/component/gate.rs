//! Gates that hold a component's install until its parents are done.
//!
//! Every component declared as a child gets one [`Gate`]. A gate starts with
//! no permits; each parent adds one when it finishes and the child waits
//! for as many permits as it has parents. With a single parent this is a
//! one-shot signal, with several it counts down.
//!
//! Gates only follow edges that keep the wait graph acyclic. An edge into
//! the root, or one that closes a cycle, is dropped with a warning.

use std::collections::{HashMap, HashSet};
use std::iter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{ComponentName, DependencyDeclaration};

/// How a parent finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    Completed,
    Failed,
}

/// Countdown for one child component.
#[derive(Debug)]
pub struct Gate {
    permits: Semaphore,
    parents: u32,
    parent_failed: AtomicBool,
}

impl Gate {
    fn new(parents: u32) -> Self {
        Self {
            permits: Semaphore::new(0),
            parents,
            parent_failed: AtomicBool::new(false),
        }
    }

    fn signal(&self, signal: GateSignal) {
        if signal == GateSignal::Failed {
            self.parent_failed.store(true, Ordering::SeqCst);
        }
        self.permits.add_permits(1);
    }

    /// Wait until every parent has signalled. Returns `Failed` if any of
    /// them did.
    pub async fn wait(&self) -> GateSignal {
        // The semaphore is never closed, so acquire only returns once all
        // parents are in.
        if let Ok(permit) = self.permits.acquire_many(self.parents).await {
            permit.forget();
        }
        if self.parent_failed.load(Ordering::SeqCst) {
            GateSignal::Failed
        } else {
            GateSignal::Completed
        }
    }

    pub fn parents(&self) -> u32 {
        self.parents
    }
}

/// All gates for one install run.
#[derive(Debug)]
pub struct GateSet {
    gates: HashMap<ComponentName, Arc<Gate>>,
    children: HashMap<ComponentName, Vec<ComponentName>>,
}

impl GateSet {
    pub fn from_declaration(declaration: &DependencyDeclaration) -> Self {
        let edges = acyclic_edges(declaration);
        let mut parents: HashMap<&ComponentName, u32> = HashMap::new();
        let mut children: HashMap<ComponentName, Vec<ComponentName>> = HashMap::new();
        for (parent, child) in &edges {
            *parents.entry(*child).or_default() += 1;
            children
                .entry((*parent).clone())
                .or_default()
                .push((*child).clone());
        }
        let gates = parents
            .into_iter()
            .map(|(child, count)| (child.clone(), Arc::new(Gate::new(count))))
            .collect();
        Self { gates, children }
    }

    /// The gate for `name`, or `None` when nothing declares it as a child.
    pub fn gate(&self, name: &ComponentName) -> Option<Arc<Gate>> {
        self.gates.get(name).cloned()
    }

    /// Signal every declared child of `parent` once.
    pub fn signal_children(&self, parent: &ComponentName, signal: GateSignal) {
        let Some(children) = self.children.get(parent) else {
            return;
        };
        for child in children {
            if let Some(gate) = self.gates.get(child) {
                debug!("{} signals {} ({:?})", parent, child, signal);
                gate.signal(signal);
            }
        }
    }

    /// Guard that signals `parent`'s children when dropped. Dropping without
    /// calling [`SignalGuard::complete`] (e.g. while unwinding) signals
    /// `Failed`.
    pub fn guard(self: &Arc<Self>, parent: ComponentName) -> SignalGuard {
        SignalGuard {
            gates: Arc::clone(self),
            parent,
            signal: GateSignal::Failed,
        }
    }
}

/// Declared parent → child edges a gate may wait on, in declaration order.
///
/// Walks depth-first from the root, then from every parent the root never
/// reached. An edge pointing at a component still on the walk's stack
/// closes a cycle and is dropped, as is any edge into the root.
fn acyclic_edges(declaration: &DependencyDeclaration) -> Vec<(&ComponentName, &ComponentName)> {
    let mut walk = EdgeWalk {
        declaration,
        on_stack: HashSet::new(),
        done: HashSet::new(),
        kept: Vec::new(),
    };
    let starts = iter::once(declaration.root()).chain(declaration.edges().map(|(p, _)| p));
    for start in starts {
        walk.visit(start);
    }
    walk.kept
}

struct EdgeWalk<'a> {
    declaration: &'a DependencyDeclaration,
    on_stack: HashSet<&'a ComponentName>,
    done: HashSet<&'a ComponentName>,
    kept: Vec<(&'a ComponentName, &'a ComponentName)>,
}

impl<'a> EdgeWalk<'a> {
    fn visit(&mut self, name: &'a ComponentName) {
        if self.done.contains(name) {
            return;
        }
        let declaration = self.declaration;
        self.on_stack.insert(name);
        for child in declaration.children_of(name) {
            if child == declaration.root() || self.on_stack.contains(child) {
                warn!(
                    "Dependency {} -> {} would form a cycle, {} will not wait for {}",
                    name, child, child, name
                );
                continue;
            }
            self.kept.push((name, child));
            self.visit(child);
        }
        self.on_stack.remove(name);
        self.done.insert(name);
    }
}

/// Signals a component's children exactly once, on drop.
pub struct SignalGuard {
    gates: Arc<GateSet>,
    parent: ComponentName,
    signal: GateSignal,
}

impl SignalGuard {
    pub fn complete(mut self, signal: GateSignal) {
        self.signal = signal;
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.gates.signal_children(&self.parent, self.signal);
    }
}
