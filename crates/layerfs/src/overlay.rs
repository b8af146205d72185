//! Language-aware overlay of several filesystems.
//!
//! An [`OverlayChain`] stacks sources in priority order. Each source has an
//! optional default language. Lookups walk the chain and take the first hit;
//! listings fan out to every source, annotate each entry with its source's
//! language, then resolve name collisions by weight (see [`crate::merge`]).
//!
//! ```text
//! chain: [A (en), B (sv)]
//!
//! A/blog: a.txt  greeting.en.txt  greeting.sv.txt
//! B/blog: a.txt  greeting.en.txt  greeting.sv.txt
//!
//! list("blog") -> a.txt (A)  greeting.en.txt (A, weight 2)
//!                 a.txt (B)  greeting.sv.txt (B, weight 2)
//! ```
//!
//! The overlay is read-only and keeps no state between calls.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, trace, warn};

use crate::error::{FsError, FsResult};
use crate::lang::LanguageAnnotator;
use crate::merge::resolve_by_raw_name;
use crate::vfs::{DirHandle, EntryDescriptor, Filesystem, Handle, Lstater, lstat_if_possible};

/// One link in the chain: a filesystem and the language it holds.
#[derive(Clone)]
pub struct OverlaySource {
    fs: Arc<dyn Filesystem>,
    lang: Option<String>,
}

impl std::fmt::Debug for OverlaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlaySource")
            .field("fs", &self.fs.name())
            .field("lang", &self.lang)
            .finish()
    }
}

impl OverlaySource {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self { fs, lang: None }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn fs(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }
}

/// Ordered sequence of overlay sources. Earlier sources win ties.
#[derive(Debug, Clone)]
pub struct OverlayChain {
    sources: Vec<OverlaySource>,
    annotator: LanguageAnnotator,
    require_language: bool,
}

impl OverlayChain {
    /// Build a chain. An empty chain is valid; every lookup is `NotFound`.
    pub fn new(annotator: LanguageAnnotator, sources: impl IntoIterator<Item = OverlaySource>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            annotator,
            require_language: false,
        }
    }

    /// Fail with `ResolutionAmbiguous` for any file whose language cannot
    /// be determined, instead of passing it through without one.
    pub fn require_language(mut self, require: bool) -> Self {
        self.require_language = require;
        self
    }

    pub fn sources(&self) -> &[OverlaySource] {
        &self.sources
    }

    pub fn annotator(&self) -> &LanguageAnnotator {
        &self.annotator
    }

    /// Find the first source that has `path`.
    ///
    /// Returns the entry as that source reports it, plus its chain index.
    /// A not-found from a source moves on to the next one; any other error
    /// stops the walk.
    #[tracing::instrument(level = "debug", skip(self, path), fields(path = %path.display()), err)]
    pub async fn stat_first(&self, path: &Path) -> FsResult<(EntryDescriptor, usize)> {
        let (entry, idx, _) = self.walk(path, false).await?;
        Ok((entry, idx))
    }

    async fn walk(&self, path: &Path, lstat: bool) -> FsResult<(EntryDescriptor, usize, bool)> {
        for (idx, source) in self.sources.iter().enumerate() {
            let result = if lstat {
                lstat_if_possible(source.fs.as_ref(), path).await
            } else {
                source.fs.stat(path).await.map(|e| (e, false))
            };
            match result {
                Ok((entry, used_lstat)) => return Ok((entry, idx, used_lstat)),
                Err(e) if e.is_not_found() => {
                    trace!(source = idx, path = %path.display(), "not in source");
                }
                Err(e) => return Err(e.in_source(idx)),
            }
        }
        Err(FsError::not_found(path))
    }

    /// Annotate an entry with the language of the source at `idx`.
    fn apply_meta(&self, idx: usize, dir: &Path, entry: EntryDescriptor) -> FsResult<EntryDescriptor> {
        let source = &self.sources[idx];
        let path = dir.join(&entry.raw_name);
        if entry.is_dir() {
            // Opening a directory goes back through the whole chain.
            return Ok(self.annotator.annotate(entry, None).with_opener(None, path));
        }
        let entry = if self.require_language {
            self.annotator
                .annotate_strict(entry, source.lang())
                .map_err(|e| e.in_source(idx))?
        } else {
            self.annotator.annotate(entry, source.lang())
        };
        Ok(entry.with_opener(Some(idx), path))
    }

    /// Annotate a looked-up entry whose own path is `path`.
    fn describe_found(&self, idx: usize, path: &Path, entry: EntryDescriptor) -> FsResult<EntryDescriptor> {
        let parent = path.parent().unwrap_or(Path::new(""));
        let mut entry = self.apply_meta(idx, parent, entry)?;
        // `apply_meta` joins the raw name onto the parent; keep the caller's path.
        if let Some(opener) = entry.opener.as_mut() {
            opener.path = path.to_path_buf();
        }
        Ok(entry)
    }

    /// Entries one source contributes to a listing of `path`.
    ///
    /// Only a source without the directory contributes nothing. Once the
    /// directory is known to exist, every failure aborts, including a
    /// not-found for an entry that vanished mid-listing.
    async fn collect(&self, idx: usize, path: &Path) -> FsResult<Vec<EntryDescriptor>> {
        let source = &self.sources[idx];
        match source.fs.stat(path).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                trace!(source = idx, path = %path.display(), "source contributes nothing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.in_source(idx)),
        }

        let entries = source
            .fs
            .list(path)
            .await
            .map_err(|e| e.during_listing().in_source(idx))?;
        entries
            .into_iter()
            .map(|entry| self.apply_meta(idx, path, entry))
            .collect()
    }

    /// List `path` across every source, resolving collisions by raw name.
    #[tracing::instrument(level = "debug", skip(self, path), fields(path = %path.display()), err)]
    pub async fn merged_list(&self, path: &Path) -> FsResult<Vec<EntryDescriptor>> {
        let mut entries = Vec::new();
        for idx in 0..self.sources.len() {
            match self.collect(idx, path).await {
                Ok(contributed) => entries.extend(contributed),
                Err(e) => {
                    warn!(source = idx, path = %path.display(), error = %e, "listing aborted");
                    return Err(e);
                }
            }
        }
        let merged = resolve_by_raw_name(entries);
        debug!(entries = merged.len(), "merged listing");
        Ok(merged)
    }

    /// Open an entry through the concrete source it came from.
    ///
    /// File entries open on their own source as a plain byte stream;
    /// directory entries open through the chain.
    pub async fn open_entry(&self, entry: &EntryDescriptor) -> FsResult<Handle> {
        let opener = entry
            .opener
            .as_ref()
            .ok_or_else(|| FsError::unsupported("open", &entry.raw_name))?;
        match opener.source {
            Some(idx) => {
                let source = self
                    .sources
                    .get(idx)
                    .ok_or_else(|| FsError::not_found(&opener.path))?;
                source
                    .fs
                    .open(&opener.path)
                    .await
                    .map_err(|e| e.in_source(idx))
            }
            None => self.open(&opener.path).await,
        }
    }
}

#[async_trait]
impl Filesystem for OverlayChain {
    fn name(&self) -> &'static str {
        "overlay-chain"
    }

    async fn stat(&self, path: &Path) -> FsResult<EntryDescriptor> {
        let (entry, idx) = self.stat_first(path).await?;
        self.describe_found(idx, path, entry)
    }

    /// Only directories open here. Files must be opened through the source
    /// that owns them, see [`OverlayChain::open_entry`].
    async fn open(&self, path: &Path) -> FsResult<Handle> {
        let (entry, _) = self.stat_first(path).await?;
        if entry.is_dir() {
            Ok(Handle::Dir(DirHandle::new(path)))
        } else {
            Err(FsError::unsupported("open", path))
        }
    }

    async fn list(&self, path: &Path) -> FsResult<Vec<EntryDescriptor>> {
        self.merged_list(path).await
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
        self.sources.iter().find_map(|s| s.fs.real_path(path))
    }
}

#[async_trait]
impl Lstater for OverlayChain {
    async fn lstat_if_possible(&self, path: &Path) -> FsResult<(EntryDescriptor, bool)> {
        let (entry, idx, used_lstat) = self.walk(path, true).await?;
        Ok((self.describe_found(idx, path, entry)?, used_lstat))
    }
}
