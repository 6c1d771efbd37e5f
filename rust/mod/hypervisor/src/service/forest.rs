//! Parent/child assembly for self-referencing records.

use std::collections::HashMap;

use crate::model::{GroupNode, PrivilegeNode};

/// A record that links to its parent by id.
pub(crate) trait TreeNode: Sized {
    fn id(&self) -> &str;
    fn superior_id(&self) -> Option<&str>;
    fn name(&self) -> &str;
    fn push_child(&mut self, child: Self);
}

impl TreeNode for PrivilegeNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn superior_id(&self) -> Option<&str> {
        self.superior_id.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn push_child(&mut self, child: Self) {
        self.children.push(child);
    }
}

impl TreeNode for GroupNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn superior_id(&self) -> Option<&str> {
        self.superior_id.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn push_child(&mut self, child: Self) {
        self.children.push(child);
    }
}

/// Assemble a flat node list into a forest.
///
/// A node whose parent is missing from `nodes` becomes a root. Siblings are
/// ordered by name, then id. Every node appears exactly once: members of a
/// parent cycle are emitted as roots, with the cycle cut where it was entered.
pub(crate) fn build_forest<N: TreeNode>(nodes: Vec<N>) -> Vec<N> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        index.entry(node.id()).or_insert(i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        match node.superior_id().and_then(|p| index.get(p).copied()) {
            Some(parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let order = |a: &usize, b: &usize| {
        let (x, y) = (&nodes[*a], &nodes[*b]);
        x.name().cmp(y.name()).then_with(|| x.id().cmp(y.id()))
    };
    roots.sort_by(order);
    for list in children.iter_mut() {
        list.sort_by(order);
    }

    let mut all_sorted: Vec<usize> = (0..nodes.len()).collect();
    all_sorted.sort_by(order);
    drop(index);

    let mut slots: Vec<Option<N>> = nodes.into_iter().map(Some).collect();
    let mut forest = Vec::with_capacity(roots.len());
    for root in roots {
        if let Some(node) = assemble(root, &mut slots, &children) {
            forest.push(node);
        }
    }
    // Anything left over sits on a parent cycle.
    for i in all_sorted {
        if let Some(node) = assemble(i, &mut slots, &children) {
            forest.push(node);
        }
    }
    forest
}

fn assemble<N: TreeNode>(i: usize, slots: &mut [Option<N>], children: &[Vec<usize>]) -> Option<N> {
    let mut node = slots[i].take()?;
    for &c in &children[i] {
        if let Some(child) = assemble(c, slots, children) {
            node.push_child(child);
        }
    }
    Some(node)
}
