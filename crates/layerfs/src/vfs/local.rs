//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with optional read-only mode.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use super::entry::{EntryDescriptor, EntryType};
use super::handle::{DirHandle, FileHandle, Handle};
use super::traits::{Filesystem, Lstater};
use crate::error::{FsError, FsResult};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/site`, then `stat("content/post.md")` looks at
/// `/srv/site/content/post.md`. Every descriptor it returns carries that
/// absolute path as its real path.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    read_only: bool,
}

impl LocalFs {
    /// Create a new local filesystem rooted at the given path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: true,
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root (via `..`).
    fn resolve(&self, path: &Path) -> FsResult<PathBuf> {
        let path = path.strip_prefix("/").unwrap_or(path);
        let full = self.root.join(path);

        // Canonicalize to resolve symlinks and `..`. For paths that don't
        // exist yet, canonicalize the parent and append the file name.
        let canonical = if full.exists() {
            full.canonicalize().map_err(|e| FsError::from_io(e, &full))?
        } else {
            match (full.parent(), full.file_name()) {
                (Some(parent), Some(filename)) if parent.exists() => parent
                    .canonicalize()
                    .map_err(|e| FsError::from_io(e, parent))?
                    .join(filename),
                // Will fail on the actual operation
                _ => full,
            }
        };

        let canonical_root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        if !canonical.starts_with(&canonical_root) {
            return Err(FsError::PermissionDenied {
                op: "resolve",
                path: format!(
                    "{} escapes {}",
                    canonical.display(),
                    canonical_root.display()
                ),
                source_index: None,
            });
        }

        Ok(canonical)
    }

    fn check_writable(&self, op: &'static str, path: &Path) -> FsResult<()> {
        if self.read_only {
            Err(FsError::not_permitted(op, path))
        } else {
            Ok(())
        }
    }

    fn describe(full_path: &Path, meta: &std::fs::Metadata) -> EntryDescriptor {
        let name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry_type = if meta.is_dir() {
            EntryType::Directory
        } else {
            EntryType::File
        };
        EntryDescriptor::plain(name, entry_type, meta.len(), meta.modified().ok())
            .with_real_path(full_path)
    }
}

#[async_trait]
impl Filesystem for LocalFs {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn stat(&self, path: &Path) -> FsResult<EntryDescriptor> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(Self::describe(&full_path, &meta))
    }

    async fn open(&self, path: &Path) -> FsResult<Handle> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        if meta.is_dir() {
            return Ok(Handle::Dir(DirHandle::new(path)));
        }
        let file = fs::File::open(&full_path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(Handle::File(FileHandle::new(full_path, file)))
    }

    async fn list(&self, path: &Path) -> FsResult<Vec<EntryDescriptor>> {
        let full_path = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(e, path))?
        {
            let entry_path = entry.path();
            // Follow symlinks like `stat` does; a dangling link lists as itself.
            let meta = match fs::metadata(&entry_path).await {
                Ok(meta) => Ok(meta),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => entry.metadata().await,
                Err(e) => Err(e),
            }
            .map_err(|e| FsError::from_io(e, &entry_path).during_listing())?;
            entries.push(Self::describe(&entry_path, &meta));
        }

        entries.sort_by(|a, b| a.raw_name.cmp(&b.raw_name));
        Ok(entries)
    }

    async fn create(&self, path: &Path, data: &[u8]) -> FsResult<()> {
        self.check_writable("create", path)?;
        let full_path = self.resolve(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FsError::from_io(e, path))?;
        }

        fs::write(&full_path, data)
            .await
            .map_err(|e| FsError::from_io(e, path))
    }

    async fn mkdir(&self, path: &Path) -> FsResult<()> {
        self.check_writable("mkdir", path)?;
        let full_path = self.resolve(path)?;
        fs::create_dir_all(&full_path)
            .await
            .map_err(|e| FsError::from_io(e, path))
    }

    async fn remove(&self, path: &Path) -> FsResult<()> {
        self.check_writable("remove", path)?;
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;

        let result = if meta.is_dir() {
            fs::remove_dir(&full_path).await
        } else {
            fs::remove_file(&full_path).await
        };
        result.map_err(|e| FsError::from_io(e, path))
    }

    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        self.check_writable("rename", from)?;
        let from_full = self.resolve(from)?;
        let to_full = self.resolve(to)?;
        fs::rename(&from_full, &to_full)
            .await
            .map_err(|e| FsError::from_io(e, from))
    }

    async fn chmod(&self, path: &Path, mode: u32) -> FsResult<()> {
        self.check_writable("chmod", path)?;
        let full_path = self.resolve(path)?;
        let mut perms = fs::metadata(&full_path)
            .await
            .map_err(|e| FsError::from_io(e, path))?
            .permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            perms.set_mode(mode);
        }
        #[cfg(not(unix))]
        perms.set_readonly(mode & 0o200 == 0);
        fs::set_permissions(&full_path, perms)
            .await
            .map_err(|e| FsError::from_io(e, path))
    }

    async fn chtimes(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> FsResult<()> {
        self.check_writable("chtimes", path)?;
        let full_path = self.resolve(path)?;
        let times = std::fs::FileTimes::new()
            .set_accessed(accessed)
            .set_modified(modified);
        tokio::task::spawn_blocking(move || {
            std::fs::File::options()
                .write(true)
                .open(&full_path)?
                .set_times(times)
        })
        .await
        .map_err(|e| FsError::from(std::io::Error::other(e)))?
        .map_err(|e| FsError::from_io(e, path))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn lstater(&self) -> Option<&dyn Lstater> {
        Some(self)
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        self.resolve(path).ok()
    }
}

#[async_trait]
impl Lstater for LocalFs {
    async fn lstat_if_possible(&self, path: &Path) -> FsResult<(EntryDescriptor, bool)> {
        let rel = path.strip_prefix("/").unwrap_or(path);
        // Don't canonicalize: that would follow the link we want to describe.
        let full_path = self.root.join(rel);
        let meta = fs::symlink_metadata(&full_path)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok((Self::describe(&full_path, &meta), true))
    }
}
