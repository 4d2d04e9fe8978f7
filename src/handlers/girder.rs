use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use serde::Deserialize;

use super::DownloadHandler;
use crate::errors::{DashboardError, Result};
use crate::file_utils::list_subdirs;

pub const DEFAULT_GIRDER_API_URL: &str = "https://girder.math.unistra.fr/api/v1";

#[derive(Debug, Deserialize)]
struct AuthToken {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "authToken")]
    auth_token: AuthToken,
}

/// A folder, item or file as listed by the Girder REST API.
#[derive(Debug, Deserialize)]
struct GirderResource {
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

/// Downloads folders from a Girder server, authenticating with the API key
/// in `GIRDER_API_KEY`.  `GIRDER_API_URL` overrides the server.
pub struct GirderHandler {
    base_url: String,
    download_base_dir: PathBuf,
    client: Client,
    token: String,
}

impl GirderHandler {
    pub fn new(download_base_dir: &Path) -> Result<GirderHandler> {
        let api_key = match env::var("GIRDER_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => return Err(DashboardError::config("GIRDER_API_KEY is not set")),
        };
        let base_url = env::var("GIRDER_API_URL").unwrap_or_else(|_| DEFAULT_GIRDER_API_URL.to_string());

        let client = Client::new();
        let response: TokenResponse = client
            .post(format!("{}/api_key/token", base_url))
            .query(&[("key", api_key.as_str())])
            .send()?
            .error_for_status()?
            .json()?;
        info!("Authenticated against {}", base_url);

        Ok(GirderHandler::with_token(base_url, response.auth_token.token, download_base_dir))
    }

    pub fn with_token(base_url: String, token: String, download_base_dir: &Path) -> GirderHandler {
        GirderHandler {
            base_url: base_url.trim_end_matches('/').to_string(),
            download_base_dir: download_base_dir.to_path_buf(),
            client: Client::new(),
            token,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn list(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<GirderResource>> {
        let resources = self
            .client
            .get(self.endpoint(path))
            .header("Girder-Token", &self.token)
            .query(query)
            .query(&[("limit", "0")])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(resources)
    }

    fn download_file(&self, file_id: &str, dest: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(self.endpoint(&format!("file/{}/download", file_id)))
            .header("Girder-Token", &self.token)
            .send()?
            .error_for_status()?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(dest)?;
        io::copy(&mut response, &mut out)?;
        Ok(())
    }

    /// Items holding a single file become that file; others become a
    /// directory named after the item.
    fn download_item(&self, item: &GirderResource, dest_dir: &Path) -> Result<()> {
        let files = self.list(&format!("item/{}/files", item.id), &[])?;
        match files.as_slice() {
            [single] => self.download_file(&single.id, &dest_dir.join(&single.name)),
            _ => {
                let item_dir = dest_dir.join(&item.name);
                fs::create_dir_all(&item_dir)?;
                for file in &files {
                    self.download_file(&file.id, &item_dir.join(&file.name))?;
                }
                Ok(())
            }
        }
    }

    fn download_folder_recursive(&self, folder_id: &str, dest_dir: &Path) -> Result<()> {
        fs::create_dir_all(dest_dir)?;
        for item in self.list("item", &[("folderId", folder_id)])? {
            self.download_item(&item, dest_dir)?;
        }
        let subfolders = self.list("folder", &[("parentType", "folder"), ("parentId", folder_id)])?;
        for folder in subfolders {
            self.download_folder_recursive(&folder.id, &dest_dir.join(&folder.name))?;
        }
        Ok(())
    }
}

impl DownloadHandler for GirderHandler {
    fn download_base_dir(&self) -> &Path {
        &self.download_base_dir
    }

    fn download_folder(&self, folder_id: &str, output_dir: Option<&str>) -> Result<Vec<String>> {
        let outdir = match output_dir {
            Some(dir) => self.download_base_dir.join(dir),
            None => self.download_base_dir.clone(),
        };
        self.download_folder_recursive(folder_id, &outdir)?;

        if !outdir.exists() {
            warn!(
                "Folder with id {} was not correctly downloaded in {}",
                folder_id,
                outdir.display()
            );
            return Ok(vec![]);
        }
        list_subdirs(&outdir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        env::remove_var("GIRDER_API_KEY");
        let err = GirderHandler::new(Path::new("/tmp")).err().unwrap();
        assert!(err.to_string().contains("GIRDER_API_KEY is not set"));
    }

    #[test]
    fn test_endpoints() {
        let handler = GirderHandler::with_token(
            "https://girder.example.org/api/v1/".to_string(),
            "token".to_string(),
            Path::new("/tmp/downloads"),
        );
        assert_eq!(handler.endpoint("item"), "https://girder.example.org/api/v1/item");
        assert_eq!(
            handler.endpoint("/file/abc/download"),
            "https://girder.example.org/api/v1/file/abc/download"
        );
        assert_eq!(handler.download_base_dir(), Path::new("/tmp/downloads"));
    }
}
