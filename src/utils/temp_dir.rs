use std::{
    env, fs, io,
    ops::Deref,
    path::{Path, PathBuf},
};

use uuid::Uuid;

/// A scratch directory under the system temp dir that is removed when
/// dropped.  Each instance gets a unique suffix so concurrent users of the
/// same label never collide.
#[derive(Debug)]
pub struct TempDir(PathBuf);

impl TempDir {
    #[cfg(test)]
    pub fn new<P: AsRef<Path>>(label: P) -> Self {
        Self::create(label).unwrap()
    }

    pub fn create<P: AsRef<Path>>(label: P) -> io::Result<Self> {
        let mut name = label.as_ref().as_os_str().to_owned();
        name.push(format!("-{}", Uuid::new_v4().as_simple()));
        let path = env::temp_dir().join(name);
        fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Deref for TempDir {
    type Target = PathBuf;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.0) {
            warn!("Problem removing temporary directory {}: {}", self.0.display(), e);
        }
    }
}
