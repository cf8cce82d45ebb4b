//! Naming and cleanup of zero-byte scratch files.
//!
//! The small files probe and stress workers create uniquely named `small_*.tmp` files and later
//! delete every file matching that pattern in the same directory.

use std::ffi::OsStr;
use std::path::Path;

use tokio::fs;
use uuid::Uuid;

use crate::error::{IoResultExt, ProbeError};

/// Prefix of small scratch files.
pub const SMALL_FILE_PREFIX: &str = "small_";

/// Extension of small scratch files, including the dot.
pub const SMALL_FILE_SUFFIX: &str = ".tmp";

/// Returns a new unique file name matching the small file pattern.
pub fn small_file_name() -> String {
    format!(
        "{SMALL_FILE_PREFIX}{}{SMALL_FILE_SUFFIX}",
        Uuid::new_v4().simple()
    )
}

/// Returns `true` if `name` matches the small file pattern.
pub fn is_small_file(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| n.starts_with(SMALL_FILE_PREFIX) && n.ends_with(SMALL_FILE_SUFFIX))
}

/// Creates `count` empty small files in `dir`.
pub async fn create_small_files(dir: &Path, count: usize) -> Result<(), ProbeError> {
    for _ in 0..count {
        let path = dir.join(small_file_name());
        fs::File::create(&path)
            .await
            .probe_context("create small file", &path)?;
    }
    Ok(())
}

/// Deletes all files in `dir` matching the small file pattern and returns how many were removed.
pub async fn remove_small_files(dir: &Path) -> Result<usize, ProbeError> {
    let mut entries = fs::read_dir(dir).await.probe_context("list", dir)?;

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await.probe_context("list", dir)? {
        if !is_small_file(&entry.file_name()) {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type().await.probe_context("stat", &path)?;
        if !file_type.is_file() {
            continue;
        }

        fs::remove_file(&path)
            .await
            .probe_context("delete small file", &path)?;
        removed += 1;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_pattern() {
        let name = small_file_name();
        assert!(is_small_file(OsStr::new(&name)));
        assert_ne!(name, small_file_name());

        assert!(!is_small_file(OsStr::new("fs_health_test.bin")));
        assert!(!is_small_file(OsStr::new("small_.bin")));
        assert!(!is_small_file(OsStr::new("stress_abc.tmp")));
    }

    #[tokio::test]
    async fn removes_only_matching_files() {
        let tempdir = tempfile::tempdir().unwrap();
        let dir = tempdir.path();
        std::fs::write(dir.join("keep.tmp"), b"").unwrap();
        std::fs::create_dir(dir.join("small_dir.tmp")).unwrap();

        create_small_files(dir, 5).await.unwrap();
        let removed = remove_small_files(dir).await.unwrap();

        assert_eq!(removed, 5);
        assert!(dir.join("keep.tmp").exists());
        assert!(dir.join("small_dir.tmp").exists());
    }
}
