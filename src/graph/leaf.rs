use std::fs;
use std::path::Path;

use itertools::Itertools;
use serde_json::{json, Map, Value};

use super::{ComponentGraph, NodeId, Payload};
use crate::errors::{DashboardError, Result};
use crate::file_utils::write_file_ensuring_parent_dir;

/// Identity of one concrete content item, e.g. one benchmark run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafInfo {
    /// The raw, unqualified item key (the directory name).
    pub item_name: String,
    /// Ancestor component ids in component order.
    pub parent_ids: Vec<String>,
}

impl LeafInfo {
    pub fn new(item_name: String, parent_ids: Vec<String>) -> Self {
        LeafInfo {
            item_name,
            parent_ids,
        }
    }

    /// `"-".join(parent_ids) + "-" + item_name`, so the same item name under
    /// two ancestor chains yields two leaves.
    pub fn leaf_id(&self) -> String {
        format!("{}-{}", self.parent_ids.join("-"), self.item_name)
    }

    /// The parent ids followed by the item name, used to match patch
    /// targets segment by segment.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.parent_ids
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.item_name.as_str()))
    }
}

impl<P: Payload> ComponentGraph<P> {
    fn expect_leaf(&self, leaf: NodeId) -> Result<&LeafInfo> {
        self[leaf].leaf.as_ref().ok_or_else(|| {
            DashboardError::Unsupported(format!("{} is not a leaf component", self[leaf].id))
        })
    }

    /// Every root-to-leaf ancestor chain of `leaf`, dash-joined and
    /// separated by commas.
    pub fn perm_parent_ids_str(&self, leaf: NodeId) -> String {
        self.get_path_to_root(leaf)
            .into_iter()
            .map(|path| path[1..].iter().rev().map(|&n| self[n].id.as_str()).join("-"))
            .filter(|chain| !chain.is_empty())
            .unique()
            .join(",")
    }

    /// Render a leaf into `base_dir/<leaf id>`, copying its partials next to
    /// it.
    pub fn render_leaf(&mut self, leaf: NodeId, base_dir: &Path) -> Result<()> {
        self.expect_leaf(leaf)?;
        let leaf_dir = base_dir.join(&self[leaf].id);
        let pages_dir = base_dir.parent().unwrap_or(base_dir);
        let self_relpath = leaf_dir.strip_prefix(pages_dir)?.to_string_lossy().to_string();
        let parent_ids = self.perm_parent_ids_str(leaf);

        if let Some(view) = self[leaf].view.as_mut() {
            let mut meta = Map::new();
            meta.insert("parent_ids".to_string(), json!(parent_ids));
            meta.insert("self_relpath".to_string(), json!(self_relpath));
            view.update_template_data(meta);
            fs::create_dir_all(&leaf_dir)?;
            view.copy_partials(&leaf_dir, pages_dir)?;
            view.render(&leaf_dir, None)?;
        }
        Ok(())
    }

    /// Merge `patch` into the leaf's template data under `prefix`.  With
    /// `save`, the patch is also written over the data file that was loaded
    /// under the same prefix.
    pub fn patch_template_info(
        &mut self,
        leaf: NodeId,
        patch: Value,
        prefix: &str,
        save: bool,
    ) -> Result<()> {
        self.expect_leaf(leaf)?;
        let leaf_id = self[leaf].id.clone();
        let view = match self[leaf].view.as_mut() {
            Some(view) => view,
            None => {
                warn!("Leaf {} has no view to patch", leaf_id);
                return Ok(());
            }
        };

        let mut update = Map::new();
        update.insert(prefix.to_string(), patch.clone());
        view.update_template_data(update);

        if !save {
            return Ok(());
        }
        let files = view.data_files_with_prefix(prefix);
        let target = match files.as_slice() {
            [] => {
                warn!(
                    "Leaf {} has no data file with prefix '{}', the patch can't be saved",
                    leaf_id, prefix
                );
                return Ok(());
            }
            [only] => only,
            [first, ..] => {
                warn!(
                    "Leaf {} has {} data files with prefix '{}', saving to {}",
                    leaf_id,
                    files.len(),
                    prefix,
                    first.display()
                );
                first
            }
        };
        write_file_ensuring_parent_dir(target, &serde_json::to_string_pretty(&patch)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::tests::MockView;
    use crate::utils::temp_dir::TempDir;
    use std::path::PathBuf;

    #[derive(Clone, Debug)]
    struct FileBackedView {
        inner: MockView,
        files: Vec<PathBuf>,
    }

    impl Payload for FileBackedView {
        fn template_data(&self) -> &Map<String, Value> {
            self.inner.template_data()
        }

        fn update_template_data(&mut self, data: Map<String, Value>) {
            self.inner.update_template_data(data)
        }

        fn render(&mut self, output_dir: &Path, filename: Option<&str>) -> Result<()> {
            self.inner.render(output_dir, filename)
        }

        fn data_files_with_prefix(&self, _prefix: &str) -> Vec<PathBuf> {
            self.files.clone()
        }
    }

    #[test]
    fn test_leaf_id() {
        let mut g = ComponentGraph::new();
        let leaf = g.add_leaf(
            "item_001",
            Some("TestRepo".to_string()),
            vec!["parentA".to_string(), "parentB".to_string()],
            Some(MockView::new("LeafView")),
        );

        assert_eq!(g[leaf].id, "parentA-parentB-item_001");
        assert_eq!(g[leaf].repository.as_deref(), Some("TestRepo"));
        let info = g[leaf].leaf.as_ref().unwrap();
        assert_eq!(info.item_name, "item_001");
        assert_eq!(info.parent_ids, vec!["parentA", "parentB"]);
    }

    #[test]
    fn test_leaf_identity_depends_on_path() {
        let a = LeafInfo::new("run".to_string(), vec!["m1".to_string(), "app".to_string()]);
        let b = LeafInfo::new("run".to_string(), vec!["m2".to_string(), "app".to_string()]);
        let c = LeafInfo::new("run".to_string(), vec!["m1".to_string(), "app".to_string()]);

        assert_ne!(a.leaf_id(), b.leaf_id());
        assert_eq!(a.leaf_id(), c.leaf_id());
    }

    #[test]
    fn test_leaf_clone_fails() {
        let mut g = ComponentGraph::new();
        let leaf = g.add_leaf("item", None, vec!["p".to_string()], Some(MockView::new("")));

        let err = g.clone_node(leaf).unwrap_err();
        assert!(err.to_string().contains("Leaf component cannot be cloned"));
    }

    #[test]
    fn test_perm_parent_ids_str() {
        let mut g = ComponentGraph::new();
        let root = g.add_node("Root", None);
        let a1 = g.add_node_with_parents("A1", None, &[root]);
        let a2 = g.add_node_with_parents("A2", None, &[root]);
        let leaf = g.add_leaf(
            "item_L",
            None,
            vec!["A1".to_string(), "B1".to_string()],
            Some(MockView::new("")),
        );
        g.add_parent(leaf, a1);
        g.add_parent(leaf, a2);

        let chains = g.perm_parent_ids_str(leaf);
        let mut chains: Vec<&str> = chains.split(',').collect();
        chains.sort();
        assert_eq!(chains, vec!["Root-A1", "Root-A2"]);
    }

    #[test]
    fn test_patch_template_info_no_save() {
        let mut g = ComponentGraph::new();
        let leaf = g.add_leaf("item", None, vec!["p".to_string()], Some(MockView::new("")));
        let patch = json!({ "test_key": 123, "nested": { "a": "b" } });

        g.patch_template_info(leaf, patch.clone(), "meta", false).unwrap();

        assert_eq!(g[leaf].view.as_ref().unwrap().template_data()["meta"], patch);
    }

    #[test]
    fn test_patch_template_info_saves_to_first_file() {
        let dir = TempDir::new("dashboard-leaf-patch");
        let first = dir.join("first.json");
        let second = dir.join("second.json");
        fs::write(&first, "{}").unwrap();
        fs::write(&second, "{}").unwrap();

        let mut g = ComponentGraph::new();
        let view = FileBackedView {
            inner: MockView::new(""),
            files: vec![first.clone(), second.clone()],
        };
        let leaf = g.add_leaf("item", None, vec!["p".to_string()], Some(view));
        let patch = json!({ "plots": [1, 2] });

        g.patch_template_info(leaf, patch.clone(), "plots", true).unwrap();

        let saved: Value = serde_json::from_str(&fs::read_to_string(&first).unwrap()).unwrap();
        assert_eq!(saved, patch);
        assert_eq!(fs::read_to_string(&second).unwrap(), "{}");
    }

    #[test]
    fn test_patch_template_info_without_file_still_merges() {
        let mut g = ComponentGraph::new();
        let view = FileBackedView {
            inner: MockView::new(""),
            files: vec![],
        };
        let leaf = g.add_leaf("item", None, vec!["p".to_string()], Some(view));

        g.patch_template_info(leaf, json!(1), "plots", true).unwrap();

        assert_eq!(g[leaf].view.as_ref().unwrap().template_data()["plots"], 1);
    }
}
