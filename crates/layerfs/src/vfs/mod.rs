//! Filesystem capability set and the concrete backing stores.
//!
//! - **Filesystem**: the trait every store and every decorator implements
//! - **Lstater**: optional accelerated-lstat capability, probed at runtime
//! - **MemoryFs**: in-memory ephemeral storage
//! - **LocalFs**: real filesystem access rooted at a directory
//!
//! The decorators (`PrefixRouter`, `OverlayChain`) live in their own
//! modules and hold `Arc<dyn Filesystem>` references to what they wrap.

mod entry;
mod handle;
mod local;
mod memory;
pub mod path;
mod traits;

pub use entry::{Attributes, EntryDescriptor, EntryType, Opener};
pub use handle::{DirHandle, FileHandle, Handle, ReadLimit};
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use traits::{Filesystem, Lstater, lstat_if_possible};
