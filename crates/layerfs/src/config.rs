//! Configuration for a layered filesystem tree.
//!
//! Configuration is loaded from `~/.config/layerfs/layerfs.toml`:
//!
//! ```toml
//! languages = ["en", "sv"]
//!
//! [[mounts]]
//! from = "/blog"
//! to = "/srv/site/content/blog"
//! lang = "en"
//!
//! [[sources]]
//! path = "/srv/site/content/en"
//! lang = "en"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::lang::{LanguageAnnotator, LanguageSet};
use crate::overlay::{OverlayChain, OverlaySource};
use crate::router::{PrefixRouter, RootMapping};
use crate::vfs::LocalFs;

/// Roots and sources to assemble at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Recognized language identifiers.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Treat a file with no language signal as an error.
    #[serde(default)]
    pub require_language: bool,

    /// Virtual roots for the prefix router.
    #[serde(default)]
    pub mounts: Vec<MountConfig>,

    /// Overlay sources, highest priority first.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// One virtual root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Virtual prefix (e.g., "/blog").
    pub from: String,

    /// Real prefix it maps to.
    pub to: PathBuf,

    /// Language of everything under this root.
    #[serde(default)]
    pub lang: Option<String>,

    /// Module the mount was resolved from, kept for diagnostics.
    #[serde(default)]
    pub module: Option<ModuleConfig>,
}

/// Provenance of a mount supplied by a module resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub path: String,
    pub dir: PathBuf,
    #[serde(default)]
    pub version: Option<String>,
}

/// One link of the overlay chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory on disk.
    pub path: PathBuf,

    /// Default language of files in this directory.
    #[serde(default)]
    pub lang: Option<String>,

    /// Open the directory read-only. Mutations through the overlay are
    /// rejected either way.
    #[serde(default = "default_read_only")]
    pub read_only: bool,
}

fn default_read_only() -> bool {
    true
}

impl LayerConfig {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config file path.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "layerfs").context("Could not determine config directory")?;

        Ok(dirs.config_dir().join("layerfs.toml"))
    }

    pub fn language_set(&self) -> LanguageSet {
        self.languages.iter().cloned().collect()
    }

    pub fn annotator(&self) -> LanguageAnnotator {
        LanguageAnnotator::new(self.language_set())
    }

    /// Prefix router over the local disk with the configured mounts.
    pub fn build_router(&self) -> PrefixRouter {
        let mappings = self.mounts.iter().map(|mount| {
            if let Some(module) = &mount.module {
                tracing::debug!(
                    from = %mount.from,
                    module = %module.path,
                    version = module.version.as_deref().unwrap_or("-"),
                    "mount provided by module"
                );
            }
            let mapping = RootMapping::new(&mount.from, &mount.to);
            match &mount.lang {
                Some(lang) => mapping.with_lang(lang.clone()),
                None => mapping,
            }
        });
        PrefixRouter::new(Arc::new(LocalFs::read_only("/")), mappings).with_annotator(self.annotator())
    }

    /// Overlay chain with one local store per configured source.
    pub fn build_chain(&self) -> OverlayChain {
        let sources = self.sources.iter().map(|source| {
            let fs = if source.read_only {
                LocalFs::read_only(&source.path)
            } else {
                LocalFs::new(&source.path)
            };
            let overlay = OverlaySource::new(Arc::new(fs));
            match &source.lang {
                Some(lang) => overlay.with_lang(lang.clone()),
                None => overlay,
            }
        });
        OverlayChain::new(self.annotator(), sources).require_language(self.require_language)
    }
}
