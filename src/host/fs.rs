//! Filesystem access for the path-based tools

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// The subset of file metadata the tools report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub is_dir: bool,
    pub is_file: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl From<std::fs::Metadata> for FileMeta {
    fn from(meta: std::fs::Metadata) -> Self {
        Self {
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

/// One directory entry; `meta` is None when the entry could not be stat'ed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub meta: Option<FileMeta>,
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn metadata(&self, path: &Path) -> io::Result<FileMeta>;

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write or append bytes, creating parent directories
    async fn write(&self, path: &Path, bytes: &[u8], append: bool) -> io::Result<()>;

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Resolve symlinks along the existing prefix of `path`
    async fn canonicalize(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// The real filesystem via tokio::fs
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        Ok(tokio::fs::metadata(path).await?.into())
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write(&self, path: &Path, bytes: &[u8], append: bool) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = match entry.metadata().await {
                Ok(meta) => Some(meta.into()),
                Err(e) => {
                    log::debug!("Cannot stat {}: {}", entry.path().display(), e);
                    None
                }
            };
            entries.push(DirEntry { name, meta });
        }

        Ok(entries)
    }

    async fn canonicalize(&self, path: &Path) -> PathBuf {
        // New files don't exist yet, so canonicalize the deepest existing ancestor
        let mut existing = path.to_path_buf();
        let mut rest = Vec::new();
        loop {
            if let Ok(resolved) = tokio::fs::canonicalize(&existing).await {
                return rest.iter().rev().fold(resolved, |acc: PathBuf, part| acc.join(part));
            }
            match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
                (Some(name), Some(parent)) => {
                    rest.push(name);
                    existing = parent.to_path_buf();
                }
                _ => return path.to_path_buf(),
            }
        }
    }
}
