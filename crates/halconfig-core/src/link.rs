//! Parent linking ("parentify").
//!
//! Freshly built nodes carry no parent. Linking walks top-down and points
//! every child at the node that contains it. Relinking an already linked
//! tree is harmless; after attaching a new subtree only that subtree needs
//! to be walked.

use crate::tree::{ConfigTree, NodeId};

/// Link every node reachable from the root. Returns the number of nodes
/// visited.
pub fn parentify(tree: &mut ConfigTree) -> usize {
    let root = tree.root();
    tree.set_parent(root, None);
    parentify_subtree(tree, root)
}

/// Link every node below `top`. The parent of `top` itself is left as is.
pub fn parentify_subtree(tree: &mut ConfigTree, top: NodeId) -> usize {
    let mut visited = 0;
    let mut stack = vec![top];
    while let Some(id) = stack.pop() {
        visited += 1;
        let children: Vec<NodeId> = tree.children(id).collect();
        for child in children {
            tree.set_parent(child, Some(id));
            stack.push(child);
        }
    }
    visited
}

/// Link a newly attached subtree under `parent`.
pub fn attach(tree: &mut ConfigTree, parent: NodeId, child: NodeId) -> usize {
    tree.set_parent(child, Some(parent));
    parentify_subtree(tree, child)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::Schema;

    fn tree(doc: &str) -> ConfigTree {
        ConfigTree::parse(doc.as_bytes(), Arc::new(Schema::untyped()))
            .unwrap()
            .unwrap()
    }

    fn assert_linked(tree: &ConfigTree) {
        for id in tree.walk(tree.root()) {
            for child in tree.children(id) {
                assert_eq!(tree.parent(child), Some(id), "stale parent at {}", tree.node_path(child));
            }
        }
    }

    #[test]
    fn test_parentify_counts_all_nodes() {
        let mut tree = tree("a:\n  b: [1, 2, {c: 3}]\nd: x\n");
        // root, a, b, 1, 2, {c}, 3, d
        assert_eq!(parentify(&mut tree), 8);
        assert_linked(&tree);
    }

    #[test]
    fn test_parentify_is_idempotent() {
        let mut tree = tree("a:\n  b:\n  - c: 1\n");
        let before: Vec<_> = tree.walk(tree.root()).map(|id| tree.parent(id)).collect();

        parentify(&mut tree);
        parentify(&mut tree);

        let after: Vec<_> = tree.walk(tree.root()).map(|id| tree.parent(id)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_attach_links_only_new_subtree() {
        let mut tree = tree("a:\n  b: 1\n");
        let a = tree.resolve("a").unwrap();

        let value: serde_yaml::Value = serde_yaml::from_str("x:\n  y: [1, 2]\n").unwrap();
        // set_field attaches through `attach`
        let c = tree.set_field(a, "c", value).unwrap();

        assert_eq!(tree.parent(c), Some(a));
        assert_eq!(tree.node_path(tree.resolve("a.c.x.y[1]").unwrap()), "a.c.x.y[1]");
        assert_linked(&tree);
    }

    #[test]
    fn test_parentify_repairs_after_mutation() {
        let mut tree = tree("a:\n  b: [1]\n");
        let b = tree.resolve("a.b").unwrap();
        tree.push(b, serde_yaml::Value::from(2)).unwrap();

        // a global relink reaches the same result as the incremental one
        parentify(&mut tree);
        assert_linked(&tree);
        assert_eq!(tree.node_path(tree.resolve("a.b[1]").unwrap()), "a.b[1]");
    }
}
