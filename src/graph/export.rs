use std::collections::HashMap;
use std::fmt::Write;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use super::{ComponentGraph, NodeId};

impl<P> ComponentGraph<P> {
    /// Indented outline of everything reachable from `root`, two spaces per
    /// level.  Content leaves are suffixed with `*`.
    pub fn dump(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.traverse(root, &mut |graph, node, level| {
            let marker = if graph[node].is_leaf_component() { " *" } else { "" };
            let _ = writeln!(out, "{}{}{}", "  ".repeat(level), graph[node].id, marker);
        });
        out
    }

    /// Graphviz rendering of the subgraph reachable from `root`.
    pub fn to_dot(&self, root: NodeId) -> String {
        let mut graph: DiGraph<String, &str> = DiGraph::new();
        let mut indices: HashMap<NodeId, NodeIndex> = HashMap::new();
        let mut pending = vec![root];

        while let Some(node) = pending.pop() {
            let from = *indices
                .entry(node)
                .or_insert_with(|| graph.add_node(self[node].id.clone()));
            for &child in self[node].children() {
                let to = match indices.get(&child) {
                    Some(&idx) => idx,
                    None => {
                        let idx = graph.add_node(self[child].id.clone());
                        indices.insert(child, idx);
                        pending.push(child);
                        idx
                    }
                };
                graph.update_edge(from, to, "");
            }
        }

        format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}
