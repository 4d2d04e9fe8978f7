//! The dashboard configuration file and the defaulting applied to it before
//! any repository gets built.

use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ordered_map::OrderedMap;
use super::template_info::{TemplateDataItem, TemplateInfo};
use crate::errors::{DashboardError, Result};
use crate::graph::tree_utils::dict_tree_to_lists;

/// Keys that can only appear in a leaf record.
const LEAF_RECORD_KEYS: &[&str] = &["platform", "path", "template_info"];

/// Where a batch of leaves comes from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LeafMetadata {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub template_info: TemplateInfo,
}

fn default_platform() -> String {
    "local".to_string()
}

impl LeafMetadata {
    /// Fill in the repository-wide leaf defaults; explicit values win.
    pub fn with_defaults(&self, defaults: &TemplateInfo) -> LeafMetadata {
        let mut merged = self.clone();
        if merged.template_info.template.is_none() {
            merged.template_info.template = defaults.template.clone();
        }
        merged.template_info.extend_unique(&defaults.data);
        merged
    }
}

/// A level of the component mapping: either a group of child components or
/// the record describing the leaves found at that position.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigNode {
    Group(Vec<(String, ConfigNode)>),
    LeafRecord(LeafMetadata),
}

impl Default for ConfigNode {
    fn default() -> Self {
        ConfigNode::Group(vec![])
    }
}

impl ConfigNode {
    /// A mapping is a leaf record when it carries a leaf-only key or any of
    /// its values is not itself a mapping.
    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(format!("expected a mapping in component_map, got {}", other)),
        };
        let is_record = LEAF_RECORD_KEYS.iter().any(|k| map.contains_key(*k))
            || map.values().any(|v| !v.is_object());
        if is_record {
            return serde_json::from_value(Value::Object(map))
                .map(ConfigNode::LeafRecord)
                .map_err(|e| e.to_string());
        }
        let mut children = vec![];
        for (key, child) in map {
            children.push((key, ConfigNode::from_value(child)?));
        }
        Ok(ConfigNode::Group(children))
    }

    pub fn children(&self) -> &[(String, ConfigNode)] {
        match self {
            ConfigNode::Group(children) => children,
            ConfigNode::LeafRecord(_) => &[],
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.children().iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Every leaf record with the component path leading to it.
    pub fn collect_metadata(&self) -> Vec<(&LeafMetadata, Vec<String>)> {
        let mut out = vec![];
        self.collect_metadata_at(&mut vec![], &mut out);
        out
    }

    fn collect_metadata_at<'a>(&'a self, path: &mut Vec<String>, out: &mut Vec<(&'a LeafMetadata, Vec<String>)>) {
        match self {
            ConfigNode::LeafRecord(meta) => out.push((meta, path.clone())),
            ConfigNode::Group(children) => {
                for (key, child) in children {
                    path.push(key.clone());
                    child.collect_metadata_at(path, out);
                    path.pop();
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for ConfigNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ConfigNode::from_value(value).map_err(de::Error::custom)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComponentMap {
    /// Repository names, one per mapping level.
    pub component_order: Vec<String>,
    pub mapping: ConfigNode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ComponentMapJson {
    Full {
        #[serde(default)]
        component_order: Option<Vec<String>>,
        mapping: ConfigNode,
    },
    Raw(ConfigNode),
}

/// Template settings applied to everything that doesn't override them.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TemplateDefaults {
    #[serde(default)]
    pub repositories: TemplateInfo,
    #[serde(default)]
    pub leaves: TemplateInfo,
    /// Keyed by repository name, or `all`.
    #[serde(default)]
    pub components: OrderedMap<TemplateInfo>,
}

#[derive(Deserialize)]
struct DashboardConfigJson {
    component_map: ComponentMapJson,
    components: OrderedMap<OrderedMap<TemplateInfo>>,
    #[serde(default)]
    repositories: Option<OrderedMap<TemplateInfo>>,
    #[serde(default)]
    views: Option<Map<String, Value>>,
    #[serde(default)]
    dashboard_metadata: Option<TemplateInfo>,
    #[serde(default)]
    template_defaults: Option<TemplateDefaults>,
}

/// Fully defaulted dashboard configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardConfig {
    pub component_map: ComponentMap,
    /// Repository name to the template info of each of its components.
    pub components: OrderedMap<OrderedMap<TemplateInfo>>,
    pub repositories: OrderedMap<TemplateInfo>,
    /// Repository name to a nested mapping of view orders.
    pub views: Map<String, Value>,
    pub dashboard_metadata: TemplateInfo,
    pub template_defaults: TemplateDefaults,
}

/// Load a `.json` or `.toml` configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DashboardConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        DashboardError::config(format!("Problem reading config '{}': {}", path.display(), e))
    })?;
    let raw: DashboardConfigJson = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&contents)?,
        _ => serde_json::from_str(&contents)
            .map_err(|e| DashboardError::config(format!("{}: {}", path.display(), e)))?,
    };
    info!("Loaded dashboard configuration from {}", path.display());
    DashboardConfig::resolve(raw)
}

impl DashboardConfig {
    pub fn from_value(value: Value) -> Result<DashboardConfig> {
        let raw: DashboardConfigJson =
            serde_json::from_value(value).map_err(|e| DashboardError::config(e.to_string()))?;
        DashboardConfig::resolve(raw)
    }

    fn resolve(raw: DashboardConfigJson) -> Result<DashboardConfig> {
        let (order, mapping) = match raw.component_map {
            ComponentMapJson::Full {
                component_order,
                mapping,
            } => (component_order, mapping),
            ComponentMapJson::Raw(mapping) => (None, mapping),
        };

        let mut repositories = raw.repositories.unwrap_or_default();
        infer_repositories(&mut repositories, &raw.components);

        let component_order = match order {
            Some(order) => order,
            None => infer_order(&mapping, &raw.components)?,
        };
        for name in &component_order {
            if !raw.components.contains_key(name) {
                return Err(DashboardError::config(format!(
                    "Repository {} not defined in components",
                    name
                )));
            }
        }

        let views = match raw.views {
            Some(views) => normalize_views(views),
            None => default_views(&component_order),
        };

        let mut config = DashboardConfig {
            component_map: ComponentMap {
                component_order,
                mapping,
            },
            components: raw.components,
            repositories,
            views,
            dashboard_metadata: raw.dashboard_metadata.unwrap_or_default(),
            template_defaults: raw.template_defaults.unwrap_or_default(),
        };
        config.validate_views()?;
        config.apply_template_defaults()?;
        Ok(config)
    }

    fn validate_views(&self) -> Result<()> {
        for view_order in self.view_orders() {
            for name in &view_order {
                if !self.component_map.component_order.contains(name) {
                    return Err(DashboardError::config(format!("Repository {} not defined", name)));
                }
            }
        }
        Ok(())
    }

    /// Push `template_defaults` down onto repositories and components.
    fn apply_template_defaults(&mut self) -> Result<()> {
        let defaults = &self.template_defaults;
        for key in defaults.components.keys() {
            if key != "all" && !self.repositories.contains_key(key) {
                return Err(DashboardError::config(format!(
                    "Template defaults: {} does not exist in repositories",
                    key
                )));
            }
        }

        let for_all = defaults.components.get("all");
        for (repo_id, components) in self.components.iter_mut() {
            let for_repo = defaults.components.get(repo_id);
            for (_, info) in components.iter_mut() {
                if info.template.is_none() {
                    info.template = for_repo
                        .and_then(|d| d.template.clone())
                        .or_else(|| for_all.and_then(|d| d.template.clone()));
                }
                if let Some(all) = for_all {
                    info.extend_unique(&all.data);
                }
                if let Some(repo) = for_repo {
                    info.extend_unique(&repo.data);
                }
            }
        }

        for (_, info) in self.repositories.iter_mut() {
            if info.template.is_none() {
                info.template = defaults.repositories.template.clone();
            }
            info.extend_unique(&defaults.repositories.data);
        }
        Ok(())
    }

    /// Every view order declared for any repository.
    pub fn view_orders(&self) -> Vec<Vec<String>> {
        dict_tree_to_lists(&self.views)
    }

    /// View orders headed by `repository_id`.
    pub fn view_orders_for(&self, repository_id: &str) -> Vec<Vec<String>> {
        match self.views.get(repository_id) {
            Some(views) => {
                let mut single = Map::new();
                single.insert(repository_id.to_string(), views.clone());
                dict_tree_to_lists(&single)
            }
            None => vec![],
        }
    }
}

/// Title casing: first letter of every alphabetic run upper
/// case, the rest lower case.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

fn infer_repositories(
    repositories: &mut OrderedMap<TemplateInfo>,
    components: &OrderedMap<OrderedMap<TemplateInfo>>,
) {
    for repo_id in components.keys() {
        if repositories.contains_key(repo_id) {
            continue;
        }
        let mut title = Map::new();
        title.insert("title".to_string(), Value::String(title_case(repo_id)));
        repositories.insert(
            repo_id.clone(),
            TemplateInfo::with_data(vec![TemplateDataItem::Inline(title)]),
        );
    }
}

/// Walk the mapping one depth at a time and name each depth after the
/// repository owning its ids.
fn infer_order(mapping: &ConfigNode, components: &OrderedMap<OrderedMap<TemplateInfo>>) -> Result<Vec<String>> {
    let mut order: Vec<String> = vec![];
    let mut level: Vec<&ConfigNode> = vec![mapping];
    loop {
        let ids: Vec<&String> = level.iter().flat_map(|n| n.children().iter().map(|(k, _)| k)).collect();
        if ids.is_empty() {
            break;
        }
        let owner = components
            .iter()
            .find(|(_, comps)| ids.iter().any(|id| comps.contains_key(id)))
            .map(|(repo, _)| repo.clone());
        match owner {
            Some(repo) if !order.contains(&repo) => order.push(repo),
            Some(_) => {}
            None => {
                return Err(DashboardError::config(format!(
                    "Could not infer component order: no repository owns {}",
                    ids[0]
                )))
            }
        }
        level = level.iter().flat_map(|n| n.children().iter().map(|(_, c)| c)).collect();
    }
    Ok(order)
}

/// `[X, Y, Z]` lists become `{X: {Y: Z}}`.
fn list_to_tree(items: &[Value]) -> Value {
    match items {
        [] => Value::Object(Map::new()),
        [last] => last.clone(),
        [first, rest @ ..] => {
            let key = match first {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let mut map = Map::new();
            map.insert(key, list_to_tree(rest));
            Value::Object(map)
        }
    }
}

fn normalize_views(views: Map<String, Value>) -> Map<String, Value> {
    views
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Array(items) => list_to_tree(&items),
                Value::Object(sub) => Value::Object(normalize_views(sub)),
                other => other,
            };
            (k, v)
        })
        .collect()
}

fn default_views(order: &[String]) -> Map<String, Value> {
    if order.len() < 2 {
        return Map::new();
    }
    let items: Vec<Value> = order.iter().map(|s| Value::String(s.clone())).collect();
    match list_to_tree(&items) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
