//! Where leaf directories come from.  Every platform ends up with a local
//! directory whose sub-directories are the leaves.

use std::path::PathBuf;

use crate::errors::{DashboardError, Result};
use crate::file_format::dashboard_config::LeafMetadata;
use crate::file_utils::list_subdirs;
use crate::handlers::{DownloadHandler, GirderHandler};
use crate::utils::temp_dir::TempDir;

/// A local directory holding one sub-directory per leaf.  Downloaded
/// content keeps its scratch directory alive for as long as this value (or
/// the scratch dir moved out of it) lives.
#[derive(Debug)]
pub struct LeafLocation {
    pub dir: PathBuf,
    pub scratch: Option<TempDir>,
}

impl LeafLocation {
    /// Sorted leaf names.
    pub fn leaf_names(&self) -> Result<Vec<String>> {
        list_subdirs(&self.dir)
    }
}

pub trait LeafLoader {
    /// Make the leaves available locally.  `None` means there is nothing to
    /// load.
    fn fetch(&self) -> Result<Option<LeafLocation>>;
}

pub struct LocalLeafLoader {
    location: Option<PathBuf>,
}

impl LocalLeafLoader {
    pub fn new(location: Option<PathBuf>) -> Self {
        if let Some(path) = &location {
            if !path.exists() {
                warn!("{} does not contain any files", path.display());
            }
        }
        LocalLeafLoader { location }
    }
}

impl LeafLoader for LocalLeafLoader {
    fn fetch(&self) -> Result<Option<LeafLocation>> {
        match &self.location {
            Some(dir) if dir.is_dir() => Ok(Some(LeafLocation {
                dir: dir.clone(),
                scratch: None,
            })),
            _ => Ok(None),
        }
    }
}

/// Downloads a Girder folder into a scratch directory, then behaves like a
/// local loader over it.
pub struct GirderLeafLoader {
    folder_id: Option<String>,
}

impl LeafLoader for GirderLeafLoader {
    fn fetch(&self) -> Result<Option<LeafLocation>> {
        let folder_id = match &self.folder_id {
            Some(id) => id,
            None => return Ok(None),
        };
        let scratch = TempDir::create("dashboard-girder")?;
        let handler = GirderHandler::new(scratch.path())?;
        let downloaded = handler.download_folder(folder_id, None)?;
        info!("Downloaded {} leaves from girder folder {}", downloaded.len(), folder_id);

        Ok(Some(LeafLocation {
            dir: scratch.path().to_path_buf(),
            scratch: Some(scratch),
        }))
    }
}

/// Pick the loader for a leaf record's platform.
pub fn create_loader(metadata: &LeafMetadata) -> Result<Box<dyn LeafLoader>> {
    if metadata.path.is_none() {
        warn!("Leaf path is not defined");
    }
    match metadata.platform.as_str() {
        "local" => Ok(Box::new(LocalLeafLoader::new(metadata.path.as_ref().map(PathBuf::from)))),
        "girder" => Ok(Box::new(GirderLeafLoader {
            folder_id: metadata.path.clone(),
        })),
        other => Err(DashboardError::Unsupported(format!(
            "Leaf platform {} is not implemented",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn metadata(platform: &str, path: Option<&str>) -> LeafMetadata {
        LeafMetadata {
            platform: platform.to_string(),
            path: path.map(String::from),
            template_info: Default::default(),
        }
    }

    #[test]
    fn test_local_loader_lists_sorted_subdirs() {
        let dir = TempDir::new("dashboard-local-loader");
        for name in &["2024_02", "2024_01"] {
            fs::create_dir_all(dir.join(name)).unwrap();
        }

        let loader = create_loader(&metadata("local", dir.to_str())).unwrap();
        let location = loader.fetch().unwrap().unwrap();
        assert!(location.scratch.is_none());
        assert_eq!(location.leaf_names().unwrap(), vec!["2024_01", "2024_02"]);
    }

    #[test]
    fn test_local_loader_without_directory() {
        let loader = create_loader(&metadata("local", None)).unwrap();
        assert!(loader.fetch().unwrap().is_none());

        let loader = create_loader(&metadata("local", Some("/nonexistent/dashboard/leaves"))).unwrap();
        assert!(loader.fetch().unwrap().is_none());
    }

    #[test]
    fn test_unknown_platform() {
        let err = create_loader(&metadata("s3", Some("bucket"))).err().unwrap();
        assert!(matches!(err, DashboardError::Unsupported(_)));
    }

    #[test]
    fn test_girder_without_folder_loads_nothing() {
        let loader = create_loader(&metadata("girder", None)).unwrap();
        assert!(loader.fetch().unwrap().is_none());
    }
}
