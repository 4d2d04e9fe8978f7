//! The component graph: an arena of nodes linked by parent/child edges.
//!
//! Nodes are addressed by `NodeId` handles into a `ComponentGraph`.  A node
//! may have several parents (a leaf reachable from many views) and children
//! are kept in insertion order so that rendering is deterministic.
//! `ComponentGraph::permute_tree` clones components into the same arena
//! below a fresh root and links the original leaves under the copies; the
//! source tree is left untouched.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::errors::Result;

pub mod export;
pub mod leaf;
pub mod node;
pub mod tree_utils;

pub use leaf::LeafInfo;
pub use node::{ComponentGraph, GraphNode, NodeId, Topology};

/// Reserved template data key for the output of an aggregation pass.
pub const AGGREGATED_KEY: &str = "aggregated";

/// The rendering payload attached to a node.  The engine only ever goes
/// through this interface, so tests can use lightweight stand-ins.
pub trait Payload: Clone {
    fn template_data(&self) -> &Map<String, Value>;

    /// Shallow-merge `data` into the template data, replacing existing keys.
    fn update_template_data(&mut self, data: Map<String, Value>);

    /// Write the payload's output document into `output_dir`, using the
    /// payload's own file name when `filename` is `None`.
    fn render(&mut self, output_dir: &Path, filename: Option<&str>) -> Result<()>;

    /// Copy asset directories next to the rendered output.
    fn copy_partials(&mut self, _target_dir: &Path, _pages_dir: &Path) -> Result<()> {
        Ok(())
    }

    /// Backing data files that were loaded under `prefix`, in declaration
    /// order.
    fn data_files_with_prefix(&self, _prefix: &str) -> Vec<PathBuf> {
        vec![]
    }
}

/// Signature of the bottom-up fold run by `ComponentGraph::upstream_view_data`:
/// `(node_id, repository, own_template_data, child_results)`.
pub type Aggregator<'a> = dyn FnMut(&str, Option<&str>, &Map<String, Value>, &[Value]) -> Value + 'a;
