//! Helpers for nested mappings and for reordering tree levels.

use serde_json::{Map, Value};

use super::{ComponentGraph, NodeId};
use crate::errors::Result;
use crate::file_format::dashboard_config::ConfigNode;

/// Flatten a nested mapping into its root-to-leaf key paths.  Non-mapping
/// values terminate a path and are appended as its last element.
///
/// `{"A": {"B": "C", "D": "E"}}` becomes `[["A", "B", "C"], ["A", "D", "E"]]`.
pub fn dict_tree_to_lists(tree: &Map<String, Value>) -> Vec<Vec<String>> {
    let mut lists = vec![];
    collect_lists(tree, &mut vec![], &mut lists);
    lists
}

fn collect_lists(tree: &Map<String, Value>, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    for (key, value) in tree {
        prefix.push(key.clone());
        match value {
            Value::Object(sub) => collect_lists(sub, prefix, out),
            Value::String(s) => {
                let mut list = prefix.clone();
                list.push(s.clone());
                out.push(list);
            }
            Value::Null => out.push(prefix.clone()),
            other => {
                let mut list = prefix.clone();
                list.push(other.to_string());
                out.push(list);
            }
        }
        prefix.pop();
    }
}

/// Recursively merge `b` into a copy of `a`.  Nested mappings present on both
/// sides are merged; anything else in `b` replaces what `a` had.
pub fn merge_dicts(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut result = a.clone();
    for (key, value) in b {
        let merged = match (result.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                Value::Object(merge_dicts(existing, incoming))
            }
            _ => value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}

/// Pick the elements of `path` in `perm` order.  Indices past the end of
/// `path` are skipped, so a branch shorter than the permutation keeps what
/// it has.
pub fn permute_path<T: Clone>(path: &[T], perm: &[usize]) -> Vec<T> {
    perm.iter().filter_map(|&idx| path.get(idx).cloned()).collect()
}

/// An ordered tree of ids, the shape a permuted mapping takes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdTree {
    children: Vec<(String, IdTree)>,
}

impl IdTree {
    pub fn children(&self) -> &[(String, IdTree)] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&IdTree> {
        self.children.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    fn entry(&mut self, id: &str) -> &mut IdTree {
        let pos = match self.children.iter().position(|(k, _)| k == id) {
            Some(pos) => pos,
            None => {
                self.children.push((id.to_string(), IdTree::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[pos].1
    }

    /// Insert `path`, sharing any prefix that already exists.
    pub fn insert_path<S: AsRef<str>>(&mut self, path: &[S]) {
        let mut cursor = self;
        for id in path {
            cursor = cursor.entry(id.as_ref());
        }
    }

    /// Number of root-to-terminal paths.
    pub fn branch_count(&self) -> usize {
        if self.children.is_empty() {
            return 1;
        }
        self.children.iter().map(|(_, c)| c.branch_count()).sum()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (id, child) in &self.children {
            map.insert(id.clone(), child.to_value());
        }
        Value::Object(map)
    }
}

/// Every component id path of the mapping, down to each leaf record or
/// empty group.
pub fn mapping_branches(mapping: &ConfigNode) -> Vec<Vec<String>> {
    let mut out = vec![];
    collect_branches(mapping, &mut vec![], &mut out);
    out
}

fn collect_branches(node: &ConfigNode, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    match node {
        ConfigNode::LeafRecord(_) => out.push(prefix.clone()),
        ConfigNode::Group(children) if children.is_empty() => {
            if !prefix.is_empty() {
                out.push(prefix.clone());
            }
        }
        ConfigNode::Group(children) => {
            for (key, child) in children {
                prefix.push(key.clone());
                collect_branches(child, prefix, out);
                prefix.pop();
            }
        }
    }
}

/// Rebuild the mapping's id tree with every branch's levels visited in
/// `perm` order.  Branches that share a prefix after reordering share nodes.
pub fn permute_tree_levels(mapping: &ConfigNode, perm: &[usize]) -> IdTree {
    let mut tree = IdTree::default();
    for branch in mapping_branches(mapping) {
        let permuted = permute_path(&branch, perm);
        if !permuted.is_empty() {
            tree.insert_path(&permuted);
        }
    }
    tree
}

impl<P: Clone> ComponentGraph<P> {
    /// Every root-to-structural-leaf path below `node`.
    pub fn collect_leaf_paths(&self, node: NodeId) -> Vec<Vec<NodeId>> {
        let mut out = vec![];
        self.collect_leaf_paths_at(node, &mut vec![], &mut out);
        out
    }

    fn collect_leaf_paths_at(&self, node: NodeId, prefix: &mut Vec<NodeId>, out: &mut Vec<Vec<NodeId>>) {
        prefix.push(node);
        if self[node].is_leaf() {
            out.push(prefix.clone());
        } else {
            for &child in self[node].children() {
                self.collect_leaf_paths_at(child, prefix, out);
            }
        }
        prefix.pop();
    }

    /// Build a new tree below a clone of `root` whose branches follow `perm`.
    ///
    /// Nodes at each new position are found by id or cloned from the
    /// original.  Unless `permute_leaves` is set, the trailing node of each
    /// branch stays out of the permutation and the original node is linked
    /// under the end of the new branch.
    pub fn permute_tree(&mut self, root: NodeId, perm: &[usize], permute_leaves: bool) -> Result<NodeId> {
        let paths = self.collect_leaf_paths(root);
        let new_root = self.clone_node(root)?;

        for path in paths {
            let below_root = &path[1..];
            let (to_permute, fixed_leaf) = match below_root.split_last() {
                Some(_) if permute_leaves => (below_root, None),
                Some((last, rest)) => (rest, Some(*last)),
                None => continue,
            };

            let mut cursor = new_root;
            for original in permute_path(to_permute, perm) {
                let id = self[original].id.clone();
                cursor = match self.get_child(cursor, &id) {
                    Some(found) => found,
                    None => {
                        let copy = self.clone_node(original)?;
                        self.add_child(cursor, copy)
                    }
                };
            }

            if let Some(leaf) = fixed_leaf {
                let leaf_id = self[leaf].id.clone();
                if self.get_child(cursor, &leaf_id).is_none() {
                    self.add_parent(leaf, cursor);
                }
            }
        }
        Ok(new_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests::MockView;
    use serde_json::json;

    fn as_map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_dict_tree_to_lists() {
        let cases = vec![
            (json!({}), vec![]),
            (json!({"A": "B"}), vec![vec!["A", "B"]]),
            (json!({"A": {"B": "C"}}), vec![vec!["A", "B", "C"]]),
            (
                json!({"A": {"B": "C", "D": "E"}}),
                vec![vec!["A", "B", "C"], vec!["A", "D", "E"]],
            ),
            (json!({"A": {"B": {"C": "D"}}}), vec![vec!["A", "B", "C", "D"]]),
            (
                json!({"A": {"B": "C"}, "D": {"E": "F"}}),
                vec![vec!["A", "B", "C"], vec!["D", "E", "F"]],
            ),
            (
                json!({"A": {"B": {"C": "D", "E": "F"}, "G": "H"}}),
                vec![vec!["A", "B", "C", "D"], vec!["A", "B", "E", "F"], vec!["A", "G", "H"]],
            ),
        ];
        for (tree, expected) in cases {
            assert_eq!(dict_tree_to_lists(&as_map(tree)), expected);
        }
    }

    #[test]
    fn test_merge_dicts() {
        let cases = vec![
            (json!({"x": 1}), json!({"y": 2}), json!({"x": 1, "y": 2})),
            (json!({"x": 1}), json!({"x": 99}), json!({"x": 99})),
            (json!({"a": {"b": 1}}), json!({"a": {"c": 2}}), json!({"a": {"b": 1, "c": 2}})),
            (json!({"a": {"b": 1}}), json!({"a": 42}), json!({"a": 42})),
            (
                json!({"a": {"b": {"c": 1}}}),
                json!({"a": {"b": {"d": 2}}}),
                json!({"a": {"b": {"c": 1, "d": 2}}}),
            ),
            (
                json!({"a": {"b": 1}}),
                json!({"a": {"b": {"bad": "val"}}}),
                json!({"a": {"b": {"bad": "val"}}}),
            ),
            (
                json!({"x": 1, "a": {"b": 2, "d": {"e": 5}}}),
                json!({"a": {"c": 3, "d": {"f": 6}}, "y": 10}),
                json!({"x": 1, "y": 10, "a": {"b": 2, "c": 3, "d": {"e": 5, "f": 6}}}),
            ),
        ];
        for (a, b, expected) in cases {
            assert_eq!(Value::Object(merge_dicts(&as_map(a), &as_map(b))), expected);
        }
    }

    //         root
    //       /   |   \
    //      A    B    C
    //     / \         \
    //    A1  A2        C1
    fn make_tree(g: &mut ComponentGraph<MockView>) -> NodeId {
        let root = g.add_node("root", None);
        let a = g.add_node("A", None);
        let a1 = g.add_node("A1", None);
        let a2 = g.add_node("A2", None);
        g.add_child(a, a1);
        g.add_child(a, a2);
        let b = g.add_node("B", None);
        let c = g.add_node("C", None);
        let c1 = g.add_node("C1", None);
        g.add_child(c, c1);
        g.add_child(root, a);
        g.add_child(root, b);
        g.add_child(root, c);
        root
    }

    fn sorted_paths(g: &ComponentGraph<MockView>, root: NodeId) -> Vec<String> {
        let mut paths: Vec<String> = g
            .collect_leaf_paths(root)
            .iter()
            .map(|p| g.ids_of(p).join("/"))
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_permute_tree() {
        let cases: Vec<(Vec<usize>, bool, Vec<&str>)> = vec![
            (vec![0, 1], false, vec!["root/A/A1", "root/A/A2", "root/B", "root/C/C1"]),
            (vec![1, 0], false, vec!["root/A/A1", "root/A/A2", "root/B", "root/C/C1"]),
            (vec![1, 0], true, vec!["root/A1/A", "root/A2/A", "root/B", "root/C1/C"]),
            (vec![2, 1, 0], false, vec!["root/A/A1", "root/A/A2", "root/B", "root/C/C1"]),
            (vec![0], true, vec!["root/A", "root/B", "root/C"]),
        ];
        for (perm, permute_leaves, expected) in cases {
            let mut g = ComponentGraph::new();
            let root = make_tree(&mut g);
            let new_root = g.permute_tree(root, &perm, permute_leaves).unwrap();

            assert_ne!(new_root, root);
            assert_eq!(sorted_paths(&g, new_root), expected, "perm {:?}", perm);
        }
    }

    #[test]
    fn test_permute_tree_keeps_original_leaves() {
        let mut g = ComponentGraph::new();
        let root = make_tree(&mut g);
        let a = g.get_child(root, "A").unwrap();
        let a1 = g.get_child(a, "A1").unwrap();

        let new_root = g.permute_tree(root, &[0, 1], false).unwrap();
        let new_a = g.get_child(new_root, "A").unwrap();

        assert_ne!(new_a, a);
        assert_eq!(g.get_child(new_a, "A1"), Some(a1));
        assert_eq!(g[a1].parents(), &[a, new_a]);
        assert_eq!(g.get_child(root, "A"), Some(a));
        assert_eq!(g[a].parents(), &[root]);
    }

    #[test]
    fn test_permute_tree_merges_shared_prefix() {
        // root -> m1 -> app -> run1, root -> m2 -> app -> run2
        let mut g = ComponentGraph::<MockView>::new();
        let root = g.add_node("root", None);
        let m1 = g.add_node_with_parents("m1", None, &[root]);
        let m2 = g.add_node_with_parents("m2", None, &[root]);
        let app1 = g.add_node_with_parents("app", None, &[m1]);
        let app2 = g.add_node_with_parents("app", None, &[m2]);
        g.add_node_with_parents("run1", None, &[app1]);
        g.add_node_with_parents("run2", None, &[app2]);

        let new_root = g.permute_tree(root, &[1, 0], false).unwrap();

        assert_eq!(g.ids_of(g[new_root].children()), vec!["app"]);
        assert_eq!(
            sorted_paths(&g, new_root),
            vec!["root/app/m1/run1", "root/app/m2/run2"]
        );
        assert!(g.collect_leaf_paths(new_root).len() <= g.collect_leaf_paths(root).len());
    }

    #[test]
    fn test_permute_path_skips_missing_levels() {
        assert_eq!(permute_path(&["a", "b"], &[2, 1, 0]), vec!["b", "a"]);
        assert_eq!(permute_path::<&str>(&[], &[0]), Vec::<&str>::new());
    }

    #[test]
    fn test_id_tree_insert_shares_prefix() {
        let mut tree = IdTree::default();
        tree.insert_path(&["d1", "a1", "b1"]);
        tree.insert_path(&["d1", "a1", "b2"]);
        tree.insert_path(&["d1", "a3"]);

        assert_eq!(tree.branch_count(), 3);
        assert_eq!(tree.to_value(), json!({"d1": {"a1": {"b1": {}, "b2": {}}, "a3": {}}}));
        assert!(tree.get("a1").is_none());
    }
}
