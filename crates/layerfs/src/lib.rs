//! layerfs: a layered, language-aware virtual filesystem.
//!
//! Two ways to compose backing stores into one read-only tree:
//!
//! - **PrefixRouter**: several virtual roots mapped onto one store by
//!   longest-prefix match.
//! - **OverlayChain**: several stores stacked in priority order, each with a
//!   default language; listings are merged and same-named files resolved by
//!   language weight.
//!
//! Both implement [`Filesystem`] themselves, so they stack: a router can sit
//! over a chain and a chain can hold routers.
//!
//! Every entry they hand out is an [`EntryDescriptor`] decorated with its
//! language, canonical name and provenance. Mutation calls are always
//! rejected with [`FsError::PermissionDenied`].

pub mod config;
pub mod error;
pub mod lang;
pub mod merge;
pub mod overlay;
pub mod router;
pub mod vfs;

pub use config::{LayerConfig, ModuleConfig, MountConfig, SourceConfig};
pub use error::{FsError, FsResult};
pub use lang::{LanguageAnnotator, LanguageSet, NameInfo};
pub use merge::{CollisionKey, merge_listings, resolve_by_canonical_name, resolve_by_raw_name, resolve_collisions};
pub use overlay::{OverlayChain, OverlaySource};
pub use router::{PrefixRouter, Resolution, RootMapping};
pub use vfs::{
    Attributes, DirHandle, EntryDescriptor, EntryType, FileHandle, Filesystem, Handle, LocalFs, Lstater,
    MemoryFs, Opener, ReadLimit, lstat_if_possible,
};
