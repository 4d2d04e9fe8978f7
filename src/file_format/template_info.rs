use std::env;
use std::fmt;
use std::path::Path;

use regex::{Captures, Regex};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What to do with a template data file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataAction {
    /// Parse the file and merge its content into the template data.
    Input,
    /// Copy the file or directory next to the rendered output.
    Copy,
}

impl Default for DataAction {
    fn default() -> Self {
        DataAction::Input
    }
}

#[derive(Deserialize)]
struct TemplateDataFileJson {
    filepath: String,
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    action: DataAction,
    #[serde(default)]
    format: Option<String>,
}

/// A file contributing template data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TemplateDataFileJson")]
pub struct TemplateDataFile {
    pub filepath: String,
    /// When non-empty the file's data is nested under this key.
    pub prefix: String,
    pub action: DataAction,
    /// Defaults to the file extension, or the whole path when there is none.
    pub format: String,
}

impl From<TemplateDataFileJson> for TemplateDataFile {
    fn from(raw: TemplateDataFileJson) -> Self {
        let format = match raw.format {
            Some(format) => format,
            None => infer_format(&raw.filepath),
        };
        TemplateDataFile {
            filepath: raw.filepath,
            prefix: raw.prefix,
            action: raw.action,
            format,
        }
    }
}

impl TemplateDataFile {
    pub fn new(filepath: impl Into<String>, prefix: impl Into<String>) -> Self {
        let filepath = filepath.into();
        TemplateDataFile {
            format: infer_format(&filepath),
            filepath,
            prefix: prefix.into(),
            action: DataAction::Input,
        }
    }
}

fn infer_format(filepath: &str) -> String {
    match Path::new(filepath).extension() {
        Some(ext) => ext.to_string_lossy().to_string(),
        None => filepath.to_string(),
    }
}

/// One entry of a `TemplateInfo` data list.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TemplateDataItem {
    File(TemplateDataFile),
    Inline(Map<String, Value>),
}

impl TemplateDataItem {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) if map.contains_key("filepath") => {
                serde_json::from_value(Value::Object(map))
                    .map(TemplateDataItem::File)
                    .map_err(|e| e.to_string())
            }
            Value::Object(map) => Ok(TemplateDataItem::Inline(map)),
            other => Err(format!("template data entries must be mappings, got {}", other)),
        }
    }
}

/// Which template renders a node and which data feeds it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TemplateInfo {
    pub template: Option<String>,
    pub data: Vec<TemplateDataItem>,
}

impl TemplateInfo {
    pub fn with_data(data: Vec<TemplateDataItem>) -> Self {
        TemplateInfo {
            template: None,
            data,
        }
    }

    /// Accepts `{template, data}`, a bare data file, or a bare inline
    /// mapping.  A single data entry is promoted to a one element list.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let mut map = match value {
            Value::Null => return Ok(TemplateInfo::default()),
            Value::Object(map) => map,
            other => return Err(format!("template info must be a mapping, got {}", other)),
        };

        if !map.contains_key("template") && !map.contains_key("data") {
            return Ok(TemplateInfo::with_data(vec![TemplateDataItem::from_value(
                Value::Object(map),
            )?]));
        }

        let template = match map.remove("template") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(expand_env_vars(&s)),
            Some(other) => return Err(format!("template must be a string, got {}", other)),
        };
        let data = match map.remove("data") {
            None | Some(Value::Null) => vec![],
            Some(Value::Array(items)) => items
                .into_iter()
                .map(TemplateDataItem::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            Some(single) => vec![TemplateDataItem::from_value(single)?],
        };
        Ok(TemplateInfo { template, data })
    }

    /// Append the entries of `defaults` that are not already present.
    pub fn extend_unique(&mut self, defaults: &[TemplateDataItem]) {
        for item in defaults {
            if !self.data.contains(item) {
                self.data.push(item.clone());
            }
        }
    }

    /// Files loaded under `prefix`, in declaration order.
    pub fn files_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a TemplateDataFile> + 'a {
        self.data.iter().filter_map(move |item| match item {
            TemplateDataItem::File(f) if f.prefix == prefix => Some(f),
            _ => None,
        })
    }
}

impl<'de> Deserialize<'de> for TemplateInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        TemplateInfo::from_value(value).map_err(de::Error::custom)
    }
}

impl fmt::Display for TemplateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "template={} data_entries={}",
            self.template.as_deref().unwrap_or("<default>"),
            self.data.len()
        )
    }
}

/// Expand `$VAR` and `${VAR}` from the environment, leaving unknown
/// variables untouched.
pub fn expand_env_vars(s: &str) -> String {
    lazy_static! {
        static ref RE_ENV_VAR: Regex = Regex::new(r"\$(?:\{(\w+)\}|(\w+))").unwrap();
    }

    RE_ENV_VAR
        .replace_all(s, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
            env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}
