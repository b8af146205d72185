//! Core VFS traits.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::entry::EntryDescriptor;
use super::handle::{DirHandle, Handle, ReadLimit};
use crate::error::FsResult;

/// Abstract filesystem interface.
///
/// This is the capability set every layer both consumes and exposes: a
/// backing store (memory, disk) implements it, and so does every decorator
/// wrapping one, which is what lets decorators stack.
///
/// Paths are interpreted relative to the filesystem's own root; a leading
/// `/` is accepted and ignored by the concrete stores.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Describe a file or directory.
    async fn stat(&self, path: &Path) -> FsResult<EntryDescriptor>;

    /// Open a file as a byte stream, or a directory as a listing handle.
    async fn open(&self, path: &Path) -> FsResult<Handle>;

    /// List entries in a directory.
    async fn list(&self, path: &Path) -> FsResult<Vec<EntryDescriptor>>;

    /// Create (or truncate) a file with the given contents.
    ///
    /// Returns `Err` if the filesystem is read-only.
    async fn create(&self, path: &Path, data: &[u8]) -> FsResult<()>;

    /// Create a directory (and parent directories if needed).
    async fn mkdir(&self, path: &Path) -> FsResult<()>;

    /// Remove a file or empty directory.
    async fn remove(&self, path: &Path) -> FsResult<()>;

    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()>;

    async fn chmod(&self, path: &Path, mode: u32) -> FsResult<()>;

    async fn chtimes(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> FsResult<()>;

    /// Returns true if this filesystem rejects every mutation.
    fn read_only(&self) -> bool;

    /// Optional accelerated lstat capability.
    fn lstater(&self) -> Option<&dyn Lstater> {
        None
    }

    /// Get the real filesystem path for a path in this filesystem.
    ///
    /// Returns `None` for virtual backends like `MemoryFs`.
    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        let _ = path;
        None
    }

    /// Read the entire contents of a file.
    async fn read(&self, path: &Path) -> FsResult<Vec<u8>> {
        self.open(path).await?.into_file()?.read_to_end().await
    }

    /// Read up to `limit` entries from an open directory.
    async fn read_dir(&self, dir: &DirHandle, limit: ReadLimit) -> FsResult<Vec<EntryDescriptor>> {
        Ok(limit.apply(self.list(dir.path()).await?))
    }

    /// Like `read_dir`, keeping only the raw names.
    async fn read_dir_names(&self, dir: &DirHandle, limit: ReadLimit) -> FsResult<Vec<String>> {
        let entries = self.read_dir(dir, limit).await?;
        Ok(entries.into_iter().map(|e| e.raw_name).collect())
    }

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.stat(path).await.is_ok()
    }
}

/// Extension capability: stat without following a final symlink.
#[async_trait]
pub trait Lstater: Send + Sync {
    /// Returns the entry and whether an lstat was actually performed.
    async fn lstat_if_possible(&self, path: &Path) -> FsResult<(EntryDescriptor, bool)>;
}

/// Use the store's lstat when it has one, otherwise fall back to `stat`.
pub async fn lstat_if_possible(
    fs: &dyn Filesystem,
    path: &Path,
) -> FsResult<(EntryDescriptor, bool)> {
    match fs.lstater() {
        Some(lstater) => lstater.lstat_if_possible(path).await,
        None => Ok((fs.stat(path).await?, false)),
    }
}
