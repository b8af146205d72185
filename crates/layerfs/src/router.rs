//! Prefix router: several virtual roots over one backing store.
//!
//! Each [`RootMapping`] maps a virtual prefix (`From`) onto a real prefix
//! (`To`) in the backing store. Lookups pick the mapping with the longest
//! matching prefix:
//!
//! ```text
//! From=/blog  To=/real/blog     /blog/post.md  -> /real/blog/post.md
//! From=/      To=/fallback      /about.md      -> /fallback/about.md
//! ```
//!
//! The root of the router is synthetic. Listing it yields the virtual roots
//! in registration order; it has no size or modification time.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::lang::LanguageAnnotator;
use crate::vfs::path::{clean, is_root};
use crate::vfs::{
    DirHandle, EntryDescriptor, Filesystem, Handle, Lstater, ReadLimit, lstat_if_possible,
};

/// Maps a virtual path prefix onto a real path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootMapping {
    pub from: PathBuf,
    pub to: PathBuf,
    /// Language of everything under this root, if any.
    pub lang: Option<String>,
}

impl RootMapping {
    /// Build a mapping; both paths are stored cleaned.
    pub fn new(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Self {
        Self {
            from: clean(from.as_ref()),
            to: clean(to.as_ref()),
            lang: None,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    fn root_name(&self) -> String {
        let s = self.from.to_string_lossy();
        match s.trim_start_matches('/') {
            "" => "/".to_string(),
            name => name.to_string(),
        }
    }
}

/// Outcome of resolving a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Path to hand to the backing store.
    pub real_path: PathBuf,
    /// The mapping that matched, or `None` when the path was taken as real.
    pub mapping: Option<&'a RootMapping>,
}

impl Resolution<'_> {
    pub fn matched(&self) -> bool {
        self.mapping.is_some()
    }
}

/// Read-only filesystem presenting several mapped roots as one tree.
pub struct PrefixRouter {
    base: Arc<dyn Filesystem>,
    /// Mappings keyed by cleaned `From`. Re-registering a key replaces it.
    mappings: BTreeMap<PathBuf, RootMapping>,
    /// `From` prefixes in registration order.
    virtual_roots: Vec<PathBuf>,
    annotator: LanguageAnnotator,
}

impl std::fmt::Debug for PrefixRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixRouter")
            .field("base", &self.base.name())
            .field("virtual_roots", &self.virtual_roots)
            .finish()
    }
}

impl PrefixRouter {
    /// Create a router over `base` with the given mappings.
    ///
    /// Mappings are registered in order; for duplicate `From` prefixes the
    /// last one wins.
    pub fn new(base: Arc<dyn Filesystem>, mappings: impl IntoIterator<Item = RootMapping>) -> Self {
        let mut router = Self {
            base,
            mappings: BTreeMap::new(),
            virtual_roots: Vec::new(),
            annotator: LanguageAnnotator::default(),
        };
        for mut rm in mappings {
            rm.from = clean(&rm.from);
            rm.to = clean(&rm.to);
            if !router.mappings.contains_key(&rm.from) {
                router.virtual_roots.push(rm.from.clone());
            }
            router.mappings.insert(rm.from.clone(), rm);
        }
        router
    }

    /// Convenience constructor from flat `(from, to)` pairs.
    pub fn from_pairs<P, Q>(base: Arc<dyn Filesystem>, pairs: impl IntoIterator<Item = (P, Q)>) -> Self
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        Self::new(base, pairs.into_iter().map(|(from, to)| RootMapping::new(from, to)))
    }

    /// Recognize embedded language markers when decorating entries.
    pub fn with_annotator(mut self, annotator: LanguageAnnotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Virtual roots in registration order.
    pub fn list_roots(&self) -> Vec<&RootMapping> {
        self.virtual_roots
            .iter()
            .filter_map(|from| self.mappings.get(from))
            .collect()
    }

    /// Map a virtual path onto the backing store.
    ///
    /// Matching is by whole path components, so `/blog` covers
    /// `/blog/post.md` but not `/blogger`. Never fails: with no match the
    /// cleaned path is returned as already real.
    pub fn resolve(&self, virtual_path: &Path) -> Resolution<'_> {
        let cleaned = clean(virtual_path);

        for prefix in cleaned.ancestors() {
            if let Some(rm) = self.mappings.get(prefix) {
                // `prefix` is an ancestor of `cleaned`, so this cannot fail.
                let rest = cleaned.strip_prefix(prefix).unwrap_or(Path::new(""));
                let real_path = if rest.as_os_str().is_empty() {
                    rm.to.clone()
                } else {
                    rm.to.join(rest)
                };
                trace!(virtual_path = %cleaned.display(), real_path = %real_path.display(), "resolved");
                return Resolution {
                    real_path,
                    mapping: Some(rm),
                };
            }
        }

        Resolution {
            real_path: cleaned,
            mapping: None,
        }
    }

    /// Attach provenance and language to an entry the base store returned.
    fn decorate(&self, entry: EntryDescriptor, real_path: PathBuf, rm: Option<&RootMapping>) -> EntryDescriptor {
        let mut entry = match entry.real_path {
            Some(_) => entry,
            None => entry.with_real_path(real_path),
        };
        if let Some(rm) = rm {
            entry.virtual_root = Some(rm.from.to_string_lossy().into_owned());
        }
        self.annotator.annotate(entry, rm.and_then(|rm| rm.lang.as_deref()))
    }

    fn root_entries(&self) -> Vec<EntryDescriptor> {
        self.list_roots()
            .into_iter()
            .map(|rm| {
                EntryDescriptor::synthetic_dir(rm.root_name())
                    .with_virtual_root(rm.from.to_string_lossy())
            })
            .collect()
    }
}

#[async_trait]
impl Filesystem for PrefixRouter {
    fn name(&self) -> &'static str {
        "prefix-router"
    }

    async fn stat(&self, path: &Path) -> FsResult<EntryDescriptor> {
        if is_root(path) {
            return Ok(EntryDescriptor::synthetic_dir(path.to_string_lossy()));
        }
        let res = self.resolve(path);
        let entry = self.base.stat(&res.real_path).await?;
        Ok(self.decorate(entry, res.real_path.clone(), res.mapping))
    }

    async fn open(&self, path: &Path) -> FsResult<Handle> {
        if is_root(path) {
            return Ok(Handle::Dir(DirHandle::synthetic(path)));
        }
        let res = self.resolve(path);
        match self.base.open(&res.real_path).await? {
            // Listing comes back through the router so entries get decorated.
            Handle::Dir(_) => Ok(Handle::Dir(DirHandle::new(path))),
            file => Ok(file),
        }
    }

    async fn list(&self, path: &Path) -> FsResult<Vec<EntryDescriptor>> {
        if is_root(path) {
            return Ok(self.root_entries());
        }
        let res = self.resolve(path);
        let entries = self.base.list(&res.real_path).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let real = res.real_path.join(&entry.raw_name);
                self.decorate(entry, real, res.mapping)
            })
            .collect())
    }

    async fn read_dir(&self, dir: &DirHandle, limit: ReadLimit) -> FsResult<Vec<EntryDescriptor>> {
        if dir.is_synthetic() {
            return Ok(limit.apply(self.root_entries()));
        }
        Ok(limit.apply(self.list(dir.path()).await?))
    }

    async fn create(&self, path: &Path, _data: &[u8]) -> FsResult<()> {
        Err(FsError::not_permitted("create", path))
    }

    async fn mkdir(&self, path: &Path) -> FsResult<()> {
        Err(FsError::not_permitted("mkdir", path))
    }

    async fn remove(&self, path: &Path) -> FsResult<()> {
        Err(FsError::not_permitted("remove", path))
    }

    async fn rename(&self, from: &Path, _to: &Path) -> FsResult<()> {
        Err(FsError::not_permitted("rename", from))
    }

    async fn chmod(&self, path: &Path, _mode: u32) -> FsResult<()> {
        Err(FsError::not_permitted("chmod", path))
    }

    async fn chtimes(&self, path: &Path, _accessed: SystemTime, _modified: SystemTime) -> FsResult<()> {
        Err(FsError::not_permitted("chtimes", path))
    }

    fn read_only(&self) -> bool {
        true
    }

    fn lstater(&self) -> Option<&dyn Lstater> {
        Some(self)
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        if is_root(path) {
            return None;
        }
        let res = self.resolve(path);
        self.base
            .real_path(&res.real_path)
            .or(Some(res.real_path))
    }
}

#[async_trait]
impl Lstater for PrefixRouter {
    async fn lstat_if_possible(&self, path: &Path) -> FsResult<(EntryDescriptor, bool)> {
        if is_root(path) {
            return Ok((EntryDescriptor::synthetic_dir(path.to_string_lossy()), false));
        }
        let res = self.resolve(path);
        let (entry, used_lstat) = lstat_if_possible(self.base.as_ref(), &res.real_path).await?;
        Ok((self.decorate(entry, res.real_path.clone(), res.mapping), used_lstat))
    }
}
