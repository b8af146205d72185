//! Language inference for directory entries.
//!
//! A file may carry its language in its name (`post.sv.md`) or inherit it
//! from the filesystem it lives in. The annotator works out which, and
//! derives the two identities the overlay keys on:
//!
//! - the **canonical name** (`post.sv.md`), shared by every physical copy of
//!   one logical file in one language
//! - the **translation base** (`post`), shared by every language variant
//!
//! ```
//! use layerfs::{EntryDescriptor, EntryType, LanguageAnnotator, LanguageSet};
//!
//! let annotator = LanguageAnnotator::new(LanguageSet::from_iter(["en", "sv"]));
//! let entry = EntryDescriptor::plain("post.sv.md", EntryType::File, 0, None);
//! let entry = annotator.annotate(entry, Some("en"));
//!
//! assert_eq!(entry.language.as_deref(), Some("sv"));
//! assert_eq!(entry.translation_base, "post");
//! assert_eq!(entry.weight, 1);
//! ```

use std::collections::BTreeSet;

use crate::error::{FsError, FsResult};
use crate::vfs::EntryDescriptor;

/// Recognized language identifiers.
///
/// Built once and passed to the annotator; there is no global registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageSet {
    languages: BTreeSet<String>,
}

impl LanguageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, lang: &str) -> bool {
        self.languages.contains(lang)
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for LanguageSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            languages: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Split `name` into stem and extension (with its dot).
///
/// A leading dot does not start an extension: `.hidden` has none.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        None | Some(0) => (name, ""),
        Some(i) => name.split_at(i),
    }
}

/// What a file name says about its language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInfo<'a> {
    /// Recognized language marker embedded before the extension.
    pub marker: Option<&'a str>,
    /// Name without extension and marker.
    pub translation_base: &'a str,
    /// Extension including its dot, or empty.
    pub extension: &'a str,
}

/// Annotates entries with language, canonical name and weight.
#[derive(Debug, Clone, Default)]
pub struct LanguageAnnotator {
    languages: LanguageSet,
}

impl LanguageAnnotator {
    pub fn new(languages: LanguageSet) -> Self {
        Self { languages }
    }

    pub fn languages(&self) -> &LanguageSet {
        &self.languages
    }

    /// Pull the embedded language marker out of a file name.
    ///
    /// Any recognized language in the name wins over the language of the
    /// filesystem, e.g. `mypost.en.md`.
    pub fn name_info<'a>(&self, name: &'a str) -> NameInfo<'a> {
        let (stem, extension) = split_extension(name);
        let (base, marker_ext) = split_extension(stem);
        let marker = marker_ext.strip_prefix('.').filter(|m| self.languages.contains(m));
        NameInfo {
            marker,
            translation_base: if marker.is_some() { base } else { stem },
            extension,
        }
    }

    /// Decorate `entry` with its language identity.
    ///
    /// `fs_language` is the language of the filesystem that owns the entry.
    /// A language already on the entry (set by a lower decorator) is
    /// treated as its declared language and beats `fs_language`; an
    /// embedded marker beats both. Only an embedded marker earns weight:
    /// 1 for any recognized marker, 2 when it matches `fs_language`.
    pub fn annotate(&self, mut entry: EntryDescriptor, fs_language: Option<&str>) -> EntryDescriptor {
        if entry.is_dir() {
            entry.canonical_name = entry.raw_name.clone();
            entry.translation_base = entry.raw_name.clone();
            entry.language = None;
            entry.weight = 0;
            return entry;
        }

        let info = self.name_info(&entry.raw_name);
        let (language, weight) = match info.marker {
            Some(marker) => {
                let weight = if Some(marker) == fs_language { 2 } else { 1 };
                (Some(marker.to_string()), weight)
            }
            None => (
                entry
                    .language
                    .clone()
                    .or_else(|| fs_language.map(str::to_string)),
                0,
            ),
        };

        let translation_base = info.translation_base.to_string();
        // Without an extension there is nowhere to put a marker that a later
        // pass would recognize, so the raw name stays canonical.
        let canonical_name = match &language {
            Some(lang) if !info.extension.is_empty() => {
                format!("{}.{}{}", translation_base, lang, info.extension)
            }
            _ => entry.raw_name.clone(),
        };

        entry.translation_base = translation_base;
        entry.canonical_name = canonical_name;
        entry.language = language;
        entry.weight = weight;
        entry
    }

    /// Like [`annotate`](Self::annotate), but a file whose language
    /// cannot be determined from any signal is an error.
    pub fn annotate_strict(
        &self,
        entry: EntryDescriptor,
        fs_language: Option<&str>,
    ) -> FsResult<EntryDescriptor> {
        let entry = self.annotate(entry, fs_language);
        if entry.is_file() && entry.language.is_none() {
            let path = entry
                .real_path
                .clone()
                .unwrap_or_else(|| entry.raw_name.clone().into());
            return Err(FsError::ambiguous(path));
        }
        Ok(entry)
    }
}
