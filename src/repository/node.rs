use std::fs;
use std::ops::Deref;
use std::path::Path;

use super::Repository;
use crate::errors::Result;
use crate::file_format::ordered_map::OrderedMap;
use crate::file_format::template_info::TemplateInfo;
use crate::graph::{ComponentGraph, Payload};
use crate::views::{View, ViewFactory, ViewKind};

/// The components of one type, e.g. every machine, plus the view of the
/// repository's own index page.
#[derive(Debug)]
pub struct NodeComponentRepository {
    repository: Repository,
    pub view: View,
}

impl NodeComponentRepository {
    pub fn new(
        graph: &mut ComponentGraph<View>,
        id: &str,
        components: &OrderedMap<TemplateInfo>,
        view: View,
        factory: &ViewFactory,
    ) -> Result<Self> {
        let mut repository = Repository::new(id);
        for (component_id, template_info) in components.iter() {
            let component_view = factory.create(ViewKind::Node, template_info, None, Some(component_id))?;
            let node = graph.add_node(component_id.clone(), Some(component_view));
            graph.set_repository(node, Some(id.to_string()));
            repository.add(graph, node);
        }
        debug!("Built repository {}", repository.describe(graph));
        Ok(NodeComponentRepository { repository, view })
    }

    /// Render the repository index into `base_dir/<id>`.
    pub fn render_index(&mut self, base_dir: &Path) -> Result<()> {
        let repository_dir = base_dir.join(self.repository.id());
        fs::create_dir_all(&repository_dir)?;
        self.view.render(&repository_dir, None)
    }
}

impl Deref for NodeComponentRepository {
    type Target = Repository;
    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}
