use std::collections::{HashMap, HashSet};
use std::fs;
use std::ops::{Index, IndexMut};
use std::path::Path;

use serde_json::{json, Map, Value};

use super::{Aggregator, LeafInfo, Payload, AGGREGATED_KEY};
use crate::errors::{DashboardError, Result};

/// Handle to a node inside a `ComponentGraph`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a node accepts several parents or is kept to a single owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    Graph,
    Tree,
}

#[derive(Debug)]
pub struct GraphNode<P> {
    pub id: String,
    /// Name of the repository this node's type belongs to.
    pub repository: Option<String>,
    pub view: Option<P>,
    /// Present for content leaves.
    pub leaf: Option<LeafInfo>,
    pub topology: Topology,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
}

impl<P> GraphNode<P> {
    fn new(id: String, view: Option<P>, topology: Topology) -> Self {
        GraphNode {
            id,
            repository: None,
            view,
            leaf: None,
            topology,
            parents: vec![],
            children: vec![],
        }
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_leaf_component(&self) -> bool {
        self.leaf.is_some()
    }
}

/// Arena owning every node of one dashboard structure.
#[derive(Debug)]
pub struct ComponentGraph<P> {
    nodes: Vec<GraphNode<P>>,
}

impl<P> Default for ComponentGraph<P> {
    fn default() -> Self {
        ComponentGraph { nodes: vec![] }
    }
}

impl<P> Index<NodeId> for ComponentGraph<P> {
    type Output = GraphNode<P>;

    fn index(&self, id: NodeId) -> &GraphNode<P> {
        &self.nodes[id.index()]
    }
}

impl<P> IndexMut<NodeId> for ComponentGraph<P> {
    fn index_mut(&mut self, id: NodeId) -> &mut GraphNode<P> {
        &mut self.nodes[id.index()]
    }
}

impl<P> ComponentGraph<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    fn push(&mut self, node: GraphNode<P>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Add a free-standing multi-parent node.
    pub fn add_node(&mut self, id: impl Into<String>, view: Option<P>) -> NodeId {
        self.push(GraphNode::new(id.into(), view, Topology::Graph))
    }

    /// Add a multi-parent node already linked under `parents`.
    pub fn add_node_with_parents(
        &mut self,
        id: impl Into<String>,
        view: Option<P>,
        parents: &[NodeId],
    ) -> NodeId {
        let node = self.add_node(id, view);
        for &parent in parents {
            self.link(parent, node);
        }
        node
    }

    /// Add a single-owner node, optionally linked under `parent`.
    pub fn add_tree_node(
        &mut self,
        id: impl Into<String>,
        view: Option<P>,
        parent: Option<NodeId>,
    ) -> NodeId {
        let node = self.push(GraphNode::new(id.into(), view, Topology::Tree));
        if let Some(parent) = parent {
            self.link(parent, node);
        }
        node
    }

    /// Add a content leaf.  Its id is derived from `parent_ids` and
    /// `item_name`, see `LeafInfo::leaf_id`.
    pub fn add_leaf(
        &mut self,
        item_name: impl Into<String>,
        repository: Option<String>,
        parent_ids: Vec<String>,
        view: Option<P>,
    ) -> NodeId {
        let info = LeafInfo::new(item_name.into(), parent_ids);
        let mut node = GraphNode::new(info.leaf_id(), view, Topology::Graph);
        node.repository = repository;
        node.leaf = Some(info);
        self.push(node)
    }

    pub fn set_repository(&mut self, node: NodeId, repository: Option<String>) {
        self[node].repository = repository;
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if !self[parent].children.contains(&child) {
            self[parent].children.push(child);
        }
        if !self[child].parents.contains(&parent) {
            self[child].parents.push(parent);
        }
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        self[parent].children.retain(|&c| c != child);
        self[child].parents.retain(|&p| p != parent);
    }

    /// The child of `node` whose id is `child_id`.
    pub fn get_child(&self, node: NodeId, child_id: &str) -> Option<NodeId> {
        self[node]
            .children
            .iter()
            .copied()
            .find(|&c| self[c].id == child_id)
    }

    /// Link `child` under `parent`, merging by id.
    ///
    /// When `parent` already has a child with the same id, that existing
    /// child adopts the incoming child's children (recursively applying the
    /// same rule) and the incoming node is left unlinked.  Returns the node
    /// that now occupies the position.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        let child_id = self[child].id.clone();
        match self.get_child(parent, &child_id) {
            Some(existing) if existing == child => existing,
            Some(existing) => {
                let grandchildren = self[child].children.clone();
                for grandchild in grandchildren {
                    self.detach(child, grandchild);
                    self.add_child(existing, grandchild);
                }
                existing
            }
            None => {
                if self[child].topology == Topology::Tree {
                    let old_parents = self[child].parents.clone();
                    for old in old_parents {
                        self.detach(old, child);
                    }
                }
                self.link(parent, child);
                child
            }
        }
    }

    /// Link `parent` above `node`.  Adding an existing parent is a no-op.
    pub fn add_parent(&mut self, node: NodeId, parent: NodeId) {
        self.link(parent, node);
    }

    /// Replace every parent of `node` with `parent`, removing the node from
    /// the children of its former parents.
    pub fn set_parent(&mut self, node: NodeId, parent: NodeId) {
        let old_parents = self[node].parents.clone();
        for old in old_parents {
            if old != parent {
                self.detach(old, node);
            }
        }
        self.link(parent, node);
    }

    /// Detach every descendant from its parents inside this subtree, then
    /// clear this node's children.  The node's own parents are untouched.
    pub fn unlink(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self[node].children);
        for child in children {
            self.unlink(child);
            self[child].parents.retain(|&p| p != node);
        }
    }

    /// Depth-first pre-order walk calling `f(graph, node, level)`.
    pub fn traverse<F>(&self, start: NodeId, f: &mut F)
    where
        F: FnMut(&Self, NodeId, usize),
    {
        self.traverse_at(start, 0, f);
    }

    fn traverse_at<F>(&self, node: NodeId, level: usize, f: &mut F)
    where
        F: FnMut(&Self, NodeId, usize),
    {
        f(self, node, level);
        for &child in &self[node].children {
            self.traverse_at(child, level + 1, f);
        }
    }

    /// Every structural leaf reachable from `start`, each listed once.
    pub fn get_leaves(&self, start: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut leaves = vec![];
        self.collect_leaves(start, &mut seen, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, node: NodeId, seen: &mut HashSet<NodeId>, leaves: &mut Vec<NodeId>) {
        if !seen.insert(node) {
            return;
        }
        if self[node].is_leaf() {
            leaves.push(node);
            return;
        }
        for &child in &self[node].children {
            self.collect_leaves(child, seen, leaves);
        }
    }

    /// All paths from `node` up to a root, each ordered
    /// `[node, parent, ..., root]`.
    pub fn get_path_to_root(&self, node: NodeId) -> Vec<Vec<NodeId>> {
        let parents = &self[node].parents;
        if parents.is_empty() {
            return vec![vec![node]];
        }
        let mut paths = vec![];
        for &parent in parents {
            for upper in self.get_path_to_root(parent) {
                let mut path = Vec::with_capacity(upper.len() + 1);
                path.push(node);
                path.extend(upper);
                paths.push(path);
            }
        }
        paths
    }

    pub fn ids_of(&self, nodes: &[NodeId]) -> Vec<&str> {
        nodes.iter().map(|&n| self[n].id.as_str()).collect()
    }
}

impl<P: Clone> ComponentGraph<P> {
    /// New unlinked node with the same id and repository and a cloned
    /// payload.  Content leaves can't be cloned.
    pub fn clone_node(&mut self, node: NodeId) -> Result<NodeId> {
        let source = &self[node];
        if source.is_leaf_component() {
            return Err(DashboardError::Unsupported(format!(
                "Leaf component cannot be cloned: {}",
                source.id
            )));
        }
        let mut copy = GraphNode::new(source.id.clone(), source.view.clone(), source.topology);
        copy.repository = source.repository.clone();
        Ok(self.push(copy))
    }
}

impl<P: Payload> ComponentGraph<P> {
    /// Render `node` and its descendants.
    ///
    /// The root renders straight into `base_dir`; every child renders into a
    /// sub-directory named after its id.  When `render_leaves` is false,
    /// children without children of their own are skipped so that leaves can
    /// be rendered separately.
    pub fn render(
        &mut self,
        node: NodeId,
        base_dir: &Path,
        parent_id: Option<&str>,
        render_leaves: bool,
    ) -> Result<()> {
        let id = self[node].id.clone();
        let (self_id_path, out_dir) = match parent_id {
            Some(parent) => (format!("{}-{}", parent, id), base_dir.join(&id)),
            None => (id.clone(), base_dir.to_path_buf()),
        };
        let repository = self[node].repository.clone();

        if let Some(view) = self[node].view.as_mut() {
            let mut meta = Map::new();
            meta.insert("parent_ids".to_string(), json!(parent_id.unwrap_or("")));
            meta.insert("self_id_path".to_string(), json!(self_id_path));
            meta.insert("self_id".to_string(), json!(id));
            meta.insert("self_repo_type".to_string(), json!(repository));
            view.update_template_data(meta);
            fs::create_dir_all(&out_dir)?;
            view.render(&out_dir, None)?;
        }

        let children = self[node].children.clone();
        for child in children {
            if self[child].is_leaf() {
                if !render_leaves {
                    continue;
                }
                if self[child].is_leaf_component() {
                    self.render_leaf(child, &out_dir)?;
                    continue;
                }
            }
            self.render(child, &out_dir, Some(&self_id_path), render_leaves)?;
        }
        Ok(())
    }

    /// Post-order fold from the leaves up to `node`.  Each node's result is
    /// stored in its template data under `"aggregated"` and returned.
    pub fn upstream_view_data(&mut self, node: NodeId, aggregator: &mut Aggregator<'_>) -> Value {
        let mut computed = HashMap::new();
        self.upstream_at(node, aggregator, &mut computed)
    }

    fn upstream_at(
        &mut self,
        node: NodeId,
        aggregator: &mut Aggregator<'_>,
        computed: &mut HashMap<NodeId, Value>,
    ) -> Value {
        if let Some(done) = computed.get(&node) {
            return done.clone();
        }
        let children = self[node].children.clone();
        let child_results: Vec<Value> = children
            .into_iter()
            .map(|child| self.upstream_at(child, aggregator, computed))
            .collect();

        let empty = Map::new();
        let target = &self[node];
        let own_data = target.view.as_ref().map(|v| v.template_data()).unwrap_or(&empty);
        let result = aggregator(
            &target.id,
            target.repository.as_deref(),
            own_data,
            &child_results,
        );

        if let Some(view) = self[node].view.as_mut() {
            let mut stored = Map::new();
            stored.insert(AGGREGATED_KEY.to_string(), result.clone());
            view.update_template_data(stored);
        }
        computed.insert(node, result.clone());
        result
    }
}
