// src/core/fs_ops.rs
//! Small file system helpers shared by storage, config and the token cache

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub struct FsOps;

impl FsOps {
    /// Ensure directory exists
    pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Ok(());
        }
        if !path.exists() {
            fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
            info!("Created directory: {}", path.display());
        }
        Ok(())
    }

    /// Write file, creating the parent directory first
    pub async fn write_file_safe(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))
    }

    /// Resolve `relative` against `base` unless it is already absolute
    pub fn normalize_path(base: &Path, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            base.join(relative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("eod_fs_{}_{}_{}", tag, std::process::id(), nanos))
    }

    #[test]
    fn test_normalize_path() {
        let base = Path::new("/srv/eod");
        assert_eq!(
            FsOps::normalize_path(base, Path::new("eod.db")),
            PathBuf::from("/srv/eod/eod.db")
        );
        assert_eq!(
            FsOps::normalize_path(base, Path::new("/data/eod.db")),
            PathBuf::from("/data/eod.db")
        );
    }

    #[tokio::test]
    async fn test_write_creates_parent() {
        let dir = scratch_dir("write");
        let file = dir.join("nested").join("token.json");

        FsOps::write_file_safe(&file, "{}").await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "{}");

        let _ = std::fs::remove_dir_all(dir);
    }
}
