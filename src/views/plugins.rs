use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// A hook that derives extra template data from a view's current data.  The
/// result is stored under the plugin's name every time the view's data
/// changes.
pub trait PreRenderPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, template_data: &Map<String, Value>) -> Value;
}

/// The plugins shared by every view a `ViewFactory` creates.
#[derive(Clone, Default)]
pub struct PluginSet {
    plugins: Vec<Arc<dyn PreRenderPlugin>>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn PreRenderPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn with(mut self, plugin: Arc<dyn PreRenderPlugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every plugin in registration order.  Later plugins see the output
    /// of earlier ones.
    pub fn apply(&self, template_data: &mut Map<String, Value>) {
        for plugin in &self.plugins {
            let output = plugin.process(template_data);
            template_data.insert(plugin.name().to_string(), output);
        }
    }
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}
