//! Turning `TemplateInfo` data entries into template data.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::errors::{DashboardError, Result};
use crate::file_format::ordered_map::OrderedMap;
use crate::file_format::template_info::{DataAction, TemplateDataFile, TemplateDataItem};

/// Where a data file lives once the view's data directory is applied.
pub fn resolve_path(file: &TemplateDataFile, data_dir: Option<&Path>) -> PathBuf {
    match data_dir {
        Some(dir) => dir.join(&file.filepath),
        None => PathBuf::from(&file.filepath),
    }
}

/// Extract the template data contributed by `item`.  `Copy` entries
/// contribute nothing directly; their source path is recorded in `partials`
/// under the entry's prefix.
pub fn extract_data(
    item: &TemplateDataItem,
    data_dir: Option<&Path>,
    partials: &mut OrderedMap<PathBuf>,
) -> Result<Map<String, Value>> {
    let file = match item {
        TemplateDataItem::Inline(map) => return Ok(map.clone()),
        TemplateDataItem::File(file) => file,
    };
    let path = resolve_path(file, data_dir);

    match file.action {
        DataAction::Copy => {
            if path.exists() {
                partials.insert(file.prefix.clone(), path);
            } else {
                warn!("{} does not exist, nothing to copy", path.display());
            }
            Ok(Map::new())
        }
        DataAction::Input => {
            if !path.exists() {
                warn!("{} does not exist. Skipping", path.display());
                return Ok(Map::new());
            }
            let data = read_data_file(&path, &file.format)?;
            if !file.prefix.is_empty() {
                let mut wrapped = Map::new();
                wrapped.insert(file.prefix.clone(), data);
                return Ok(wrapped);
            }
            match data {
                Value::Object(map) => Ok(map),
                other => Err(DashboardError::data(format!(
                    "{} holds a {} but data without a prefix must be a mapping",
                    path.display(),
                    value_kind(&other)
                ))),
            }
        }
    }
}

/// Parse a data file.  Empty files read as an empty mapping.
pub fn read_data_file(path: &Path, format: &str) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match format {
        "json" => serde_json::from_str(&content)
            .map_err(|e| DashboardError::data(format!("{}: {}", path.display(), e))),
        "toml" => toml::from_str(&content)
            .map_err(|e| DashboardError::data(format!("{}: {}", path.display(), e))),
        other => Err(DashboardError::Unsupported(format!(
            "Data format {} of {}",
            other,
            path.display()
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::temp_dir::TempDir;
    use serde_json::json;

    fn file_item(value: Value) -> TemplateDataItem {
        TemplateDataItem::File(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_inline_data_passes_through() {
        let mut partials = OrderedMap::new();
        let item = TemplateDataItem::Inline(json!({"k": "v"}).as_object().unwrap().clone());
        let data = extract_data(&item, None, &mut partials).unwrap();
        assert_eq!(Value::Object(data), json!({"k": "v"}));
    }

    #[test]
    fn test_input_with_prefix_and_data_dir() {
        let dir = TempDir::new("dashboard-data-input");
        fs::write(dir.join("report.json"), r#"{"a": 1}"#).unwrap();
        fs::write(dir.join("empty.json"), "").unwrap();
        let mut partials = OrderedMap::new();

        let item = file_item(json!({"filepath": "report.json", "prefix": "rep"}));
        let data = extract_data(&item, Some(dir.path()), &mut partials).unwrap();
        assert_eq!(Value::Object(data), json!({"rep": {"a": 1}}));

        let item = file_item(json!({"filepath": "report.json"}));
        let data = extract_data(&item, Some(dir.path()), &mut partials).unwrap();
        assert_eq!(Value::Object(data), json!({"a": 1}));

        let item = file_item(json!({"filepath": "empty.json"}));
        assert!(extract_data(&item, Some(dir.path()), &mut partials).unwrap().is_empty());
        assert!(partials.is_empty());
    }

    #[test]
    fn test_missing_input_is_skipped() {
        let dir = TempDir::new("dashboard-data-missing");
        let mut partials = OrderedMap::new();
        let item = file_item(json!({"filepath": "nope.json", "prefix": "x"}));
        assert!(extract_data(&item, Some(dir.path()), &mut partials).unwrap().is_empty());
    }

    #[test]
    fn test_toml_input() {
        let dir = TempDir::new("dashboard-data-toml");
        fs::write(dir.join("meta.toml"), "title = \"run\"\n").unwrap();
        let mut partials = OrderedMap::new();
        let item = file_item(json!({"filepath": "meta.toml"}));
        let data = extract_data(&item, Some(dir.path()), &mut partials).unwrap();
        assert_eq!(Value::Object(data), json!({"title": "run"}));
    }

    #[test]
    fn test_copy_registers_partial() {
        let dir = TempDir::new("dashboard-data-copy");
        fs::create_dir_all(dir.join("figures")).unwrap();
        let mut partials = OrderedMap::new();

        let item = file_item(json!({"filepath": "figures", "prefix": "figs", "action": "copy"}));
        assert!(extract_data(&item, Some(dir.path()), &mut partials).unwrap().is_empty());
        assert_eq!(partials.get("figs"), Some(&dir.join("figures")));

        let item = file_item(json!({"filepath": "absent", "prefix": "other", "action": "copy"}));
        extract_data(&item, Some(dir.path()), &mut partials).unwrap();
        assert!(!partials.contains_key("other"));
    }

    #[test]
    fn test_unprefixed_list_is_rejected() {
        let dir = TempDir::new("dashboard-data-list");
        fs::write(dir.join("list.json"), "[1, 2]").unwrap();
        let mut partials = OrderedMap::new();
        let item = file_item(json!({"filepath": "list.json"}));
        assert!(extract_data(&item, Some(dir.path()), &mut partials).is_err());
    }
}
