//! Fetching leaf data from remote storage platforms.

use std::path::Path;

use crate::errors::Result;

pub mod girder;

pub use girder::GirderHandler;

pub trait DownloadHandler {
    /// The directory downloads land in.
    fn download_base_dir(&self) -> &Path;

    /// Download a remote folder recursively into the base directory, or into
    /// `output_dir` below it.  Returns the names of the downloaded
    /// sub-directories.
    fn download_folder(&self, folder_id: &str, output_dir: Option<&str>) -> Result<Vec<String>>;
}
