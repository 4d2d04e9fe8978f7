use std::borrow;
use std::fs;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use liquid::Template;

use super::liquid_exts::{IntToUniqueStrFilterParser, JsonFilterParser, StripQuotesFilterParser};
use crate::errors::{DashboardError, Result};

static TEMPLATE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Resolves `{% include %}` names against a user template directory first and
/// the embedded templates second.
#[derive(Default, Debug, Clone)]
struct DashboardTemplateSource {
    custom_dir: Option<PathBuf>,
}

impl DashboardTemplateSource {
    fn custom_path(&self, name: &str) -> Option<PathBuf> {
        self.custom_dir
            .as_ref()
            .map(|dir| dir.join(name))
            .filter(|path| path.is_file())
    }
}

impl liquid::partials::PartialSource for DashboardTemplateSource {
    fn contains(&self, name: &str) -> bool {
        self.custom_path(name).is_some() || TEMPLATE_DIR.get_file(name).is_some()
    }

    fn names(&self) -> Vec<&str> {
        TEMPLATE_DIR
            .files()
            .filter_map(|f| f.path().to_str())
            .collect()
    }

    fn try_get<'a>(&'a self, name: &str) -> Option<borrow::Cow<'a, str>> {
        if let Some(path) = self.custom_path(name) {
            return fs::read_to_string(path).ok().map(borrow::Cow::from);
        }
        match TEMPLATE_DIR.get_file(name) {
            Some(file) => file.contents_utf8().map(borrow::Cow::from),
            _ => None,
        }
    }
}

pub fn build_parser(custom_dir: Option<&Path>) -> Result<liquid::Parser> {
    let source = DashboardTemplateSource {
        custom_dir: custom_dir.map(Path::to_path_buf),
    };
    let parser = liquid::ParserBuilder::with_stdlib()
        .filter(IntToUniqueStrFilterParser)
        .filter(JsonFilterParser)
        .filter(StripQuotesFilterParser)
        .partials(liquid::partials::LazyCompiler::new(source))
        .build()?;
    Ok(parser)
}

pub fn build_and_parse(s: &str, custom_dir: Option<&Path>) -> Result<Template> {
    Ok(build_parser(custom_dir)?.parse(s)?)
}

/// Parse one of the embedded base templates, `home.adoc.liquid` and friends.
pub fn build_and_parse_base(name: &str, custom_dir: Option<&Path>) -> Result<Template> {
    let template_str = TEMPLATE_DIR
        .get_file(name)
        .and_then(|f| f.contents_utf8())
        .ok_or_else(|| DashboardError::config(format!("No embedded template named {}", name)))?;
    build_and_parse(template_str, custom_dir)
}

/// Parse a user supplied template file.  Includes resolve relative to the
/// file's own directory.
pub fn build_and_parse_file(path: &Path) -> Result<Template> {
    let template_str = fs::read_to_string(path).map_err(|e| {
        DashboardError::data(format!("Problem reading template '{}': {}", path.display(), e))
    })?;
    build_and_parse(&template_str, path.parent())
}
