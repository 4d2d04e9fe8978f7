//! Views hold the template data of a single page and know how to render it.
//!
//! Every view renders one of the embedded base templates (home, node or
//! leaf).  A `TemplateInfo.template` adds a user template on top: it is
//! rendered first with the same data and its output is handed to the base
//! template as `extra_content`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use liquid::Template;
use serde_json::{json, Map, Value};

use crate::errors::{DashboardError, Result};
use crate::file_format::ordered_map::OrderedMap;
use crate::file_format::template_info::{DataAction, TemplateInfo};
use crate::file_utils::copy_recursively;
use crate::graph::Payload;
use crate::templating::builder::{build_and_parse_base, build_and_parse_file};

pub mod data_handler;
pub mod plugins;

pub use plugins::{PluginSet, PreRenderPlugin};

/// Variables the base templates reference.  Missing ones render as nil.
const TEMPLATE_KEYS: &[&str] = &[
    "title",
    "description",
    "datetime",
    "card_image",
    "parent_ids",
    "self_id",
    "self_id_path",
    "self_relpath",
    "self_repo_type",
    "extra_templates",
    "extra_content",
    "aggregated",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewKind {
    Home,
    Node,
    Leaf,
}

impl ViewKind {
    fn template_name(self) -> &'static str {
        match self {
            ViewKind::Home => "home.adoc.liquid",
            ViewKind::Node => "node.adoc.liquid",
            ViewKind::Leaf => "leaf.adoc.liquid",
        }
    }

    fn out_filename(self) -> &'static str {
        match self {
            ViewKind::Home | ViewKind::Node => "index.adoc",
            ViewKind::Leaf => "leaf.adoc",
        }
    }

    fn base_template_data(self, component_id: Option<&str>) -> Map<String, Value> {
        let value = match self {
            ViewKind::Home => json!({
                "title": "My Dashboard",
                "datetime": chrono::Local::now().format("%Y-%m-%d:%H:%M:%S").to_string(),
            }),
            ViewKind::Node => json!({
                "title": "Default Repository",
                "description": "Default Description",
                "self_id": component_id.unwrap_or("default_repository"),
                "parent_ids": "dashboard_index",
                "card_image": match component_id {
                    Some(id) => format!("ROOT:{}.jpg", id),
                    None => "ROOT:default-image.jpg".to_string(),
                },
            }),
            ViewKind::Leaf => json!({
                "title": component_id.unwrap_or("Default Leaf"),
                "self_id": "default_leaf",
                "parent_ids": "dashboard_index",
                "description": "Default Leaf Description",
                "card_image": "ROOT:default-image.jpg",
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[derive(Clone)]
pub struct View {
    kind: ViewKind,
    template_data: Map<String, Value>,
    /// Prefix to the source directory copied next to the output.
    partials: OrderedMap<PathBuf>,
    out_filename: Option<String>,
    base: Arc<Template>,
    extra: Option<Arc<Template>>,
    template_info: TemplateInfo,
    data_dir: Option<PathBuf>,
    plugins: Arc<PluginSet>,
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("kind", &self.kind)
            .field("out_filename", &self.out_filename)
            .field("template_info", &self.template_info)
            .field("data_dir", &self.data_dir)
            .field("partials", &self.partials)
            .field("plugins", &self.plugins)
            .finish()
    }
}

impl View {
    pub fn new(
        kind: ViewKind,
        template_info: &TemplateInfo,
        data_dir: Option<&Path>,
        base_template_data: Map<String, Value>,
        out_filename: Option<String>,
        plugins: Arc<PluginSet>,
    ) -> Result<View> {
        let custom_template = template_info.template.as_deref().map(Path::new);
        let custom_dir = custom_template
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty());

        let mut view = View {
            kind,
            template_data: Map::new(),
            partials: OrderedMap::new(),
            out_filename,
            base: Arc::new(build_and_parse_base(kind.template_name(), custom_dir)?),
            extra: None,
            template_info: template_info.clone(),
            data_dir: data_dir.map(Path::to_path_buf),
            plugins,
        };
        view.update_template_data(base_template_data);

        if let Some(template) = custom_template {
            view.extra = Some(Arc::new(build_and_parse_file(template)?));
            view.add_extra_template(template);
        }

        for item in &template_info.data {
            let data = data_handler::extract_data(item, data_dir, &mut view.partials)?;
            view.update_template_data(data);
        }
        Ok(view)
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn template_info(&self) -> &TemplateInfo {
        &self.template_info
    }

    pub fn partials(&self) -> &OrderedMap<PathBuf> {
        &self.partials
    }

    fn add_extra_template(&mut self, template: &Path) {
        let name = template
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let entry = self
            .template_data
            .entry("extra_templates".to_string())
            .or_insert_with(|| Value::Array(vec![]));
        if let Value::Array(names) = entry {
            names.push(Value::String(name));
        }
    }

    /// The data handed to the templates: the view's data with every
    /// referenced variable defined.
    fn render_globals(&self) -> Result<Map<String, Value>> {
        let mut globals = self.template_data.clone();
        for key in TEMPLATE_KEYS {
            if !globals.contains_key(*key) {
                globals.insert(key.to_string(), Value::Null);
            }
        }
        if let Some(extra) = &self.extra {
            let content = extra.render(&liquid::to_object(&globals)?)?;
            globals.insert("extra_content".to_string(), Value::String(content));
        }
        Ok(globals)
    }
}

impl Payload for View {
    fn template_data(&self) -> &Map<String, Value> {
        &self.template_data
    }

    fn update_template_data(&mut self, data: Map<String, Value>) {
        self.template_data.extend(data);
        self.plugins.apply(&mut self.template_data);
    }

    fn render(&mut self, output_dir: &Path, filename: Option<&str>) -> Result<()> {
        let filename = match filename.or(self.out_filename.as_deref()) {
            Some(name) => name.to_string(),
            None => return Err(DashboardError::config("Filename must be set")),
        };
        fs::create_dir_all(output_dir)?;

        let globals = liquid::to_object(&self.render_globals()?)?;
        let output = self.base.render(&globals)?;
        let output_path = output_dir.join(&filename);
        fs::write(&output_path, output)?;
        debug!("Rendered {}", output_path.display());
        Ok(())
    }

    fn copy_partials(&mut self, target_dir: &Path, pages_dir: &Path) -> Result<()> {
        let partials: Vec<(String, PathBuf)> = self.partials.clone().into_iter().collect();
        for (prefix, source) in partials {
            let local_path = target_dir.join(&prefix);
            copy_recursively(&source, &local_path)?;
            let relpath = local_path.strip_prefix(pages_dir)?.to_string_lossy().to_string();
            let mut update = Map::new();
            update.insert(prefix, Value::String(relpath));
            self.update_template_data(update);
        }
        Ok(())
    }

    fn data_files_with_prefix(&self, prefix: &str) -> Vec<PathBuf> {
        self.template_info
            .files_with_prefix(prefix)
            .filter(|f| f.action == DataAction::Input)
            .map(|f| data_handler::resolve_path(f, self.data_dir.as_deref()))
            .collect()
    }
}

/// Builds views of each kind with their default data and the shared plugin
/// set.
#[derive(Clone, Debug, Default)]
pub struct ViewFactory {
    plugins: Arc<PluginSet>,
}

impl ViewFactory {
    pub fn new(plugins: PluginSet) -> Self {
        ViewFactory {
            plugins: Arc::new(plugins),
        }
    }

    pub fn create(
        &self,
        kind: ViewKind,
        template_info: &TemplateInfo,
        data_dir: Option<&Path>,
        component_id: Option<&str>,
    ) -> Result<View> {
        View::new(
            kind,
            template_info,
            data_dir,
            kind.base_template_data(component_id),
            Some(kind.out_filename().to_string()),
            self.plugins.clone(),
        )
    }
}
