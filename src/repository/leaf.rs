use std::fs;
use std::ops::Deref;
use std::path::Path;

use super::leaf_loader::create_loader;
use super::Repository;
use crate::errors::Result;
use crate::file_format::dashboard_config::ConfigNode;
use crate::file_format::template_info::TemplateInfo;
use crate::graph::{ComponentGraph, LeafInfo};
use crate::utils::temp_dir::TempDir;
use crate::views::{View, ViewFactory, ViewKind};

/// Every content leaf of the dashboard.
#[derive(Debug)]
pub struct LeafComponentRepository {
    repository: Repository,
    /// Download directories backing remote leaves; removed on drop.
    scratch: Vec<TempDir>,
}

impl LeafComponentRepository {
    /// Walk `mapping` down to its leaf records and load the leaves each one
    /// points at.  A leaf appearing twice under the same ancestors is only
    /// kept once.
    pub fn new(
        graph: &mut ComponentGraph<View>,
        id: &str,
        mapping: &ConfigNode,
        leaf_defaults: &TemplateInfo,
        factory: &ViewFactory,
    ) -> Result<Self> {
        let mut repository = Repository::new(id);
        let mut scratch = vec![];

        for (record, parent_ids) in mapping.collect_metadata() {
            let metadata = record.with_defaults(leaf_defaults);
            let location = match create_loader(&metadata)?.fetch()? {
                Some(location) => location,
                None => continue,
            };

            for item_name in location.leaf_names()? {
                let leaf_id = LeafInfo::new(item_name.clone(), parent_ids.clone()).leaf_id();
                if repository.has(graph, &leaf_id) {
                    trace!("Skipping duplicate leaf {}", leaf_id);
                    continue;
                }
                let data_dir = location.dir.join(&item_name);
                let view = factory.create(
                    ViewKind::Leaf,
                    &metadata.template_info,
                    Some(data_dir.as_path()),
                    Some(&item_name),
                )?;
                let leaf = graph.add_leaf(item_name, Some(id.to_string()), parent_ids.clone(), Some(view));
                repository.add(graph, leaf);
            }
            scratch.extend(location.scratch);
        }

        debug!("Built leaf repository {}", repository.describe(graph));
        Ok(LeafComponentRepository { repository, scratch })
    }

    /// Render every leaf into `base_dir/<id>/<leaf id>`.
    pub fn render(&self, graph: &mut ComponentGraph<View>, base_dir: &Path) -> Result<()> {
        let leaves_dir = base_dir.join(self.repository.id());
        fs::create_dir_all(&leaves_dir)?;
        for leaf in self.repository.iter() {
            graph.render_leaf(leaf, &leaves_dir)?;
        }
        Ok(())
    }

    pub fn scratch_dirs(&self) -> &[TempDir] {
        &self.scratch
    }
}

impl Deref for LeafComponentRepository {
    type Target = Repository;
    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}
