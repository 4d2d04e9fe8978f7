use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;

use super::{leaf_count_aggregator, ComponentGraphBuilder, ComponentTree, DashboardLayout};
use crate::errors::{DashboardError, Result};
use crate::file_format::dashboard_config::{load_config, DashboardConfig};
use crate::graph::Aggregator;
use crate::views::{PluginSet, ViewFactory};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Engine {
    Tree,
    Graph,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::Tree
    }
}

impl FromStr for Engine {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tree" => Ok(Engine::Tree),
            "graph" => Ok(Engine::Graph),
            other => Err(DashboardError::bad_input(format!(
                "Unknown engine '{}', expected 'tree' or 'graph'",
                other
            ))),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Tree => write!(f, "tree"),
            Engine::Graph => write!(f, "graph"),
        }
    }
}

/// A built dashboard, ready to be printed, patched, aggregated and
/// rendered.
pub struct Dashboard {
    engine: Engine,
    layout: Box<dyn DashboardLayout>,
}

impl Dashboard {
    pub fn from_config_path<P: AsRef<Path>>(path: P, engine: Engine, plugins: PluginSet) -> Result<Dashboard> {
        let config = load_config(path)?;
        Dashboard::from_config(&config, engine, plugins)
    }

    pub fn from_config(config: &DashboardConfig, engine: Engine, plugins: PluginSet) -> Result<Dashboard> {
        let factory = ViewFactory::new(plugins);
        let layout: Box<dyn DashboardLayout> = match engine {
            Engine::Tree => Box::new(ComponentTree::new(config, &factory)?),
            Engine::Graph => Box::new(ComponentGraphBuilder::new(config, &factory)?),
        };
        info!("Built dashboard with the {} engine", engine);
        Ok(Dashboard { engine, layout })
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn print(&self) -> String {
        self.layout.dump()
    }

    pub fn to_dot(&self) -> String {
        self.layout.to_dot()
    }

    /// Render into `base_dir`, wiping it first when `clean` is set.
    pub fn render(&mut self, base_dir: &Path, clean: bool) -> Result<()> {
        if clean && base_dir.exists() {
            info!("Removing {}", base_dir.display());
            fs::remove_dir_all(base_dir)?;
        }
        fs::create_dir_all(base_dir)?;
        self.layout.render(base_dir)
    }

    /// Load each patch file as JSON and merge the patches into the targeted
    /// leaves under `prefix`.
    pub fn patch_template_info(
        &mut self,
        patch_files: &[PathBuf],
        targets: &[Vec<String>],
        prefix: &str,
        save: bool,
    ) -> Result<()> {
        let mut patches = vec![];
        for path in patch_files {
            let contents = fs::read_to_string(path).map_err(|e| {
                DashboardError::data(format!("Problem reading patch '{}': {}", path.display(), e))
            })?;
            let patch: Value = serde_json::from_str(&contents)?;
            patches.push(patch);
        }
        self.layout.patch_template_info(&patches, targets, prefix, save)
    }

    /// Count the leaves below every node, see `leaf_count_aggregator`.
    pub fn aggregate(&mut self) -> Value {
        self.layout.aggregate(&mut leaf_count_aggregator)
    }

    pub fn aggregate_with(&mut self, aggregator: &mut Aggregator<'_>) -> Value {
        self.layout.aggregate(aggregator)
    }
}
