//! Dependency tree built from a [`DependencyDeclaration`].

use std::collections::HashSet;

use tracing::warn;

use super::{ComponentName, DependencyDeclaration};

/// A component and the components that depend on it.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub name: ComponentName,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn find(&self, name: &ComponentName) -> Option<&TreeNode> {
        if &self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    fn walk<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a TreeNode, usize)) {
        visit(self, depth);
        for child in &self.children {
            child.walk(depth + 1, visit);
        }
    }
}

/// Tree of components rooted at the declaration's root.
///
/// Each component appears at most once. A name reached a second time is
/// skipped with a warning, which keeps the tree acyclic even when the
/// declaration is not.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyGraph {
    root: TreeNode,
}

impl DependencyGraph {
    pub fn build(declaration: &DependencyDeclaration) -> Self {
        let mut visited = HashSet::new();
        let root = insert(declaration, declaration.root().clone(), &mut visited);
        Self { root }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Top-level keys of the tree. Always just the root.
    pub fn top_level(&self) -> Vec<&ComponentName> {
        vec![&self.root.name]
    }

    /// Immediate children of `name` in declared order. Empty for leaves and
    /// for names not in the tree.
    pub fn children(&self, name: &ComponentName) -> Vec<&ComponentName> {
        self.root
            .find(name)
            .map(|node| node.children.iter().map(|c| &c.name).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &ComponentName) -> bool {
        self.root.find(name).is_some()
    }

    /// Every component in the tree, parents before children.
    pub fn order(&self) -> Vec<&ComponentName> {
        let mut names = Vec::new();
        self.root.walk(0, &mut |node, _| names.push(&node.name));
        names
    }

    /// One line per component, indented two spaces per level.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        self.root
            .walk(0, &mut |node, depth| lines.push(format!("{}{}", "  ".repeat(depth), node.name)));
        lines.join("\n")
    }
}

fn insert(
    declaration: &DependencyDeclaration,
    name: ComponentName,
    visited: &mut HashSet<ComponentName>,
) -> TreeNode {
    visited.insert(name.clone());
    let mut children = Vec::new();
    for child in declaration.children_of(&name) {
        if visited.contains(child) {
            warn!(
                "Component {} is already in the dependency tree, skipping it under {}",
                child, name
            );
            continue;
        }
        children.push(insert(declaration, child.clone(), visited));
    }
    TreeNode { name, children }
}
