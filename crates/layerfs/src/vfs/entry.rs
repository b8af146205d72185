//! Decorated directory entries.
//!
//! An [`EntryDescriptor`] is the record every layer hands upward: the name
//! the backing store reported, plus the language identity and provenance
//! the overlay needs. Descriptors are built fresh on every call and never
//! mutated once a layer has returned them.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{FsError, FsResult};

/// Type of directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}

/// Size and timestamps of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
    /// Attributes reported by a backing store.
    Real {
        size: u64,
        modified: Option<SystemTime>,
    },
    /// A node that exists only in the logical tree (the router root).
    /// It has no size or modification time.
    Synthetic,
}

/// How to open the entry again, kept as plain data.
///
/// `source` is the chain position of the store that owns the entry; `None`
/// means "open through the composite filesystem that produced it", which is
/// what merged directories use so their listing fans out again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opener {
    pub source: Option<usize>,
    pub path: PathBuf,
}

/// A file or directory record decorated with language and origin metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Name as the backing store reports it.
    pub raw_name: String,
    /// Language-normalised name; collision key for canonical merges.
    pub canonical_name: String,
    /// Inferred or inherited language tag.
    pub language: Option<String>,
    /// Canonical name without extension and language marker.
    pub translation_base: String,
    /// Path of the entry in the backing store, when one exists.
    pub real_path: Option<PathBuf>,
    /// The virtual root (mapping `From`) that produced this entry.
    pub virtual_root: Option<String>,
    /// Precedence score, only meaningful during collision resolution.
    pub weight: u32,
    pub entry_type: EntryType,
    pub attributes: Attributes,
    pub opener: Option<Opener>,
}

impl EntryDescriptor {
    /// An undecorated entry, as a plain backing store would report it.
    pub fn plain(name: impl Into<String>, entry_type: EntryType, size: u64, modified: Option<SystemTime>) -> Self {
        let name = name.into();
        Self {
            canonical_name: name.clone(),
            translation_base: name.clone(),
            raw_name: name,
            language: None,
            real_path: None,
            virtual_root: None,
            weight: 0,
            entry_type,
            attributes: Attributes::Real { size, modified },
            opener: None,
        }
    }

    /// A directory that exists only in the logical tree.
    pub fn synthetic_dir(name: impl Into<String>) -> Self {
        let mut entry = Self::plain(name, EntryType::Directory, 0, None);
        entry.attributes = Attributes::Synthetic;
        entry
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_synthetic(&self) -> bool {
        self.attributes == Attributes::Synthetic
    }

    /// Size in bytes. Fails for synthetic nodes, which have no size.
    pub fn size(&self) -> FsResult<u64> {
        match &self.attributes {
            Attributes::Real { size, .. } => Ok(*size),
            Attributes::Synthetic => Err(FsError::unsupported("size", self.display_path())),
        }
    }

    /// Modification time. Fails for synthetic nodes.
    pub fn modified(&self) -> FsResult<Option<SystemTime>> {
        match &self.attributes {
            Attributes::Real { modified, .. } => Ok(*modified),
            Attributes::Synthetic => Err(FsError::unsupported("modified", self.display_path())),
        }
    }

    pub fn with_real_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.real_path = Some(path.into());
        self
    }

    pub fn with_virtual_root(mut self, root: impl Into<String>) -> Self {
        self.virtual_root = Some(root.into());
        self
    }

    pub fn with_opener(mut self, source: Option<usize>, path: impl Into<PathBuf>) -> Self {
        self.opener = Some(Opener {
            source,
            path: path.into(),
        });
        self
    }

    fn display_path(&self) -> &Path {
        self.real_path
            .as_deref()
            .unwrap_or_else(|| Path::new(&self.raw_name))
    }
}
