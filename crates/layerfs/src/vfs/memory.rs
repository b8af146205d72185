//! In-memory filesystem implementation.
//!
//! Used as a backing store in tests and by embedders that assemble trees
//! in memory. All data is ephemeral.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use super::entry::{EntryDescriptor, EntryType};
use super::handle::{DirHandle, FileHandle, Handle};
use super::path::relative;
use super::traits::Filesystem;
use crate::error::{FsError, FsResult};

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, modified: SystemTime },
    Directory { modified: SystemTime },
}

/// In-memory filesystem.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped.
/// Permission bits are not modelled; `chmod` only checks that the path exists.
#[derive(Debug)]
pub struct MemoryFs {
    entries: RwLock<HashMap<PathBuf, Entry>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> FsError {
    FsError::from(std::io::Error::other("lock poisoned"))
}

fn describe(path: &Path, entry: &Entry) -> EntryDescriptor {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match entry {
        Entry::File { data, modified } => {
            EntryDescriptor::plain(name, EntryType::File, data.len() as u64, Some(*modified))
        }
        Entry::Directory { modified } => {
            EntryDescriptor::plain(name, EntryType::Directory, 0, Some(*modified))
        }
    }
}

impl MemoryFs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Root directory always exists
        entries.insert(
            PathBuf::new(),
            Entry::Directory {
                modified: SystemTime::now(),
            },
        );
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Ensure all parent directories exist.
    fn ensure_parents(entries: &mut HashMap<PathBuf, Entry>, path: &Path) -> FsResult<()> {
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            if let std::path::Component::Normal(s) = component {
                current.push(s);
                match entries.entry(current.clone()).or_insert(Entry::Directory {
                    modified: SystemTime::now(),
                }) {
                    Entry::Directory { .. } => {}
                    Entry::File { .. } => {
                        return Err(FsError::from_io(
                            std::io::Error::from(std::io::ErrorKind::NotADirectory),
                            &current,
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Filesystem for MemoryFs {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn stat(&self, path: &Path) -> FsResult<EntryDescriptor> {
        let normalized = relative(path);
        let entries = self.entries.read().map_err(|_| poisoned())?;

        match entries.get(&normalized) {
            Some(entry) => Ok(describe(&normalized, entry)),
            None => Err(FsError::not_found(path)),
        }
    }

    async fn open(&self, path: &Path) -> FsResult<Handle> {
        let normalized = relative(path);
        let entries = self.entries.read().map_err(|_| poisoned())?;

        match entries.get(&normalized) {
            Some(Entry::File { data, .. }) => {
                Ok(Handle::File(FileHandle::new(path, Cursor::new(data.clone()))))
            }
            Some(Entry::Directory { .. }) => Ok(Handle::Dir(DirHandle::new(path))),
            None => Err(FsError::not_found(path)),
        }
    }

    async fn list(&self, path: &Path) -> FsResult<Vec<EntryDescriptor>> {
        let normalized = relative(path);
        let entries = self.entries.read().map_err(|_| poisoned())?;

        // Verify the path is a directory
        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => {
                return Err(FsError::from_io(
                    std::io::Error::from(std::io::ErrorKind::NotADirectory),
                    path,
                ));
            }
            None => return Err(FsError::not_found(path)),
        }

        let mut result: Vec<EntryDescriptor> = entries
            .iter()
            .filter(|(entry_path, _)| {
                entry_path.parent() == Some(normalized.as_path()) && **entry_path != normalized
            })
            .map(|(entry_path, entry)| describe(entry_path, entry))
            .collect();

        // Sort for consistent ordering
        result.sort_by(|a, b| a.raw_name.cmp(&b.raw_name));
        Ok(result)
    }

    async fn create(&self, path: &Path, data: &[u8]) -> FsResult<()> {
        let normalized = relative(path);
        let mut entries = self.entries.write().map_err(|_| poisoned())?;

        Self::ensure_parents(&mut entries, &normalized)?;

        // Check we're not overwriting a directory
        if let Some(Entry::Directory { .. }) = entries.get(&normalized) {
            return Err(FsError::from_io(
                std::io::Error::from(std::io::ErrorKind::IsADirectory),
                path,
            ));
        }

        entries.insert(
            normalized,
            Entry::File {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn mkdir(&self, path: &Path) -> FsResult<()> {
        let normalized = relative(path);
        let mut entries = self.entries.write().map_err(|_| poisoned())?;

        Self::ensure_parents(&mut entries, &normalized)?;

        if let Some(existing) = entries.get(&normalized) {
            return match existing {
                Entry::Directory { .. } => Ok(()),
                Entry::File { .. } => Err(FsError::from_io(
                    std::io::Error::from(std::io::ErrorKind::AlreadyExists),
                    path,
                )),
            };
        }

        entries.insert(
            normalized,
            Entry::Directory {
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, path: &Path) -> FsResult<()> {
        let normalized = relative(path);

        if normalized.as_os_str().is_empty() {
            return Err(FsError::not_permitted("remove", "/"));
        }

        let mut entries = self.entries.write().map_err(|_| poisoned())?;

        if let Some(Entry::Directory { .. }) = entries.get(&normalized) {
            let has_children = entries.keys().any(|k| k.parent() == Some(normalized.as_path()));
            if has_children {
                return Err(FsError::from_io(
                    std::io::Error::from(std::io::ErrorKind::DirectoryNotEmpty),
                    path,
                ));
            }
        }

        entries
            .remove(&normalized)
            .ok_or_else(|| FsError::not_found(path))?;
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        let from_norm = relative(from);
        let to_norm = relative(to);
        let mut entries = self.entries.write().map_err(|_| poisoned())?;

        let entry = entries
            .remove(&from_norm)
            .ok_or_else(|| FsError::not_found(from))?;

        if matches!(entry, Entry::Directory { .. }) {
            // Move the whole subtree.
            let children: Vec<PathBuf> = entries
                .keys()
                .filter(|k| k.starts_with(&from_norm))
                .cloned()
                .collect();
            for child in children {
                if let (Some(moved), Ok(rest)) = (entries.remove(&child), child.strip_prefix(&from_norm)) {
                    entries.insert(to_norm.join(rest), moved);
                }
            }
        }

        Self::ensure_parents(&mut entries, &to_norm)?;
        entries.insert(to_norm, entry);
        Ok(())
    }

    async fn chmod(&self, path: &Path, _mode: u32) -> FsResult<()> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        if entries.contains_key(&relative(path)) {
            Ok(())
        } else {
            Err(FsError::not_found(path))
        }
    }

    async fn chtimes(&self, path: &Path, _accessed: SystemTime, modified: SystemTime) -> FsResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        match entries.get_mut(&relative(path)) {
            Some(Entry::File { modified: m, .. }) | Some(Entry::Directory { modified: m }) => {
                *m = modified;
                Ok(())
            }
            None => Err(FsError::not_found(path)),
        }
    }

    fn read_only(&self) -> bool {
        false
    }
}
