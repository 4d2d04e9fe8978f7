//! Dashboard construction engines.
//!
//! Both engines build the same universe of components and leaves from a
//! `DashboardConfig`; they differ in how view orders are materialized.  The
//! tree engine builds one permuted tree below the home page, the graph
//! engine keeps flat repositories and stores the groupings per component.

use std::path::Path;

use serde_json::Value;

use crate::errors::Result;
use crate::graph::Aggregator;

pub mod dashboard;
pub mod graph_builder;
pub mod tree_builder;

#[cfg(test)]
pub(crate) mod fixtures;

pub use crate::repository::coordinator::leaf_count_aggregator;
pub use dashboard::{Dashboard, Engine};
pub use graph_builder::ComponentGraphBuilder;
pub use tree_builder::ComponentTree;

/// Id of the home page node.
pub const ROOT_ID: &str = "dashboard_index";

pub trait DashboardLayout {
    /// Write every page below `base_dir`.
    fn render(&mut self, base_dir: &Path) -> Result<()>;

    /// Human readable outline of the structure.
    fn dump(&self) -> String;

    /// Graphviz DOT export of the structure.
    fn to_dot(&self) -> String;

    /// Run `aggregator` bottom-up from the leaves to the home page and
    /// return the home page's result.
    fn aggregate(&mut self, aggregator: &mut Aggregator<'_>) -> Value;

    fn patch_template_info(
        &mut self,
        patches: &[Value],
        targets: &[Vec<String>],
        prefix: &str,
        save: bool,
    ) -> Result<()>;
}
