use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::errors::{DashboardError, Result};

pub fn write_file_ensuring_parent_dir(file_path: &Path, contents: &str) -> Result<()> {
    let parent_path = match file_path.parent() {
        Some(p) => p,
        None => {
            return Err(DashboardError::data(format!(
                "Problem getting parent of '{}'",
                file_path.display()
            )));
        }
    };
    if let Err(e) = fs::create_dir_all(parent_path) {
        return Err(DashboardError::data(format!(
            "Problem creating parent of '{}': {}",
            file_path.display(),
            e
        )));
    }
    fs::write(file_path, contents)?;
    Ok(())
}

/// Recursively copy `src` into `dest`.  A plain file is copied to `dest`
/// itself.
pub fn copy_recursively(src: &Path, dest: &Path) -> Result<()> {
    if src.is_file() {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dest)?;
        return Ok(());
    }
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let target = dest.join(entry.path().strip_prefix(src)?);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Sorted names of the sub-directories of `dir`.
pub fn list_subdirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = vec![];
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::temp_dir::TempDir;

    #[test]
    fn test_copy_recursively() {
        let dir = TempDir::new("dashboard-copy");
        let src = dir.join("src");
        write_file_ensuring_parent_dir(&src.join("nested/a.txt"), "a").unwrap();
        write_file_ensuring_parent_dir(&src.join("b.txt"), "b").unwrap();

        let dest = dir.join("dest");
        copy_recursively(&src, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("nested/a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dest.join("b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_list_subdirs_is_sorted() {
        let dir = TempDir::new("dashboard-subdirs");
        for name in &["run_b", "run_a", "run_c"] {
            fs::create_dir_all(dir.join(name)).unwrap();
        }
        fs::write(dir.join("not_a_dir.txt"), "").unwrap();

        assert_eq!(list_subdirs(&dir).unwrap(), vec!["run_a", "run_b", "run_c"]);
    }
}
