//! Error taxonomy for the layered filesystem.
//!
//! Every call surfaces exactly one of these kinds. Backing stores report
//! `std::io::Error`; [`FsError::from_io`] folds those into the taxonomy
//! together with the offending path.

use std::io;
use thiserror::Error;

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Filesystem operation errors.
///
/// Errors raised inside an overlay chain carry the position of the failing
/// link in `source_index`. `NotFound` never does: a miss in one link is
/// absorbed, and a miss in every link belongs to no single one.
#[derive(Debug, Clone, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{}{op}: operation not permitted: {path}", at(.source_index))]
    PermissionDenied {
        op: &'static str,
        path: String,
        source_index: Option<usize>,
    },

    #[error("{}{op}: not supported: {path}", at(.source_index))]
    Unsupported {
        op: &'static str,
        path: String,
        source_index: Option<usize>,
    },

    #[error("{}cannot determine language for {path}", at(.source_index))]
    ResolutionAmbiguous {
        path: String,
        source_index: Option<usize>,
    },

    #[error("{}{}", at(.source_index), backing_message(.path, .message))]
    Backing {
        path: String,
        source_index: Option<usize>,
        kind: io::ErrorKind,
        message: String,
    },
}

fn at(source_index: &Option<usize>) -> String {
    match source_index {
        Some(idx) => format!("source {idx}: "),
        None => String::new(),
    }
}

fn backing_message(path: &str, message: &str) -> String {
    if path.is_empty() {
        message.to_string()
    } else {
        format!("{path}: {message}")
    }
}

impl FsError {
    pub fn not_found(path: impl AsRef<std::path::Path>) -> Self {
        FsError::NotFound(path.as_ref().display().to_string())
    }

    /// The fixed error every mutation call on a read-only layer returns.
    pub fn not_permitted(op: &'static str, path: impl AsRef<std::path::Path>) -> Self {
        FsError::PermissionDenied {
            op,
            path: path.as_ref().display().to_string(),
            source_index: None,
        }
    }

    pub fn unsupported(op: &'static str, path: impl AsRef<std::path::Path>) -> Self {
        FsError::Unsupported {
            op,
            path: path.as_ref().display().to_string(),
            source_index: None,
        }
    }

    pub fn ambiguous(path: impl AsRef<std::path::Path>) -> Self {
        FsError::ResolutionAmbiguous {
            path: path.as_ref().display().to_string(),
            source_index: None,
        }
    }

    /// Wrap an I/O error, keeping the offending path.
    pub fn from_io(err: io::Error, path: impl AsRef<std::path::Path>) -> Self {
        let path = path.as_ref().display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path),
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                FsError::PermissionDenied {
                    op: "io",
                    path,
                    source_index: None,
                }
            }
            io::ErrorKind::Unsupported => FsError::Unsupported {
                op: "io",
                path,
                source_index: None,
            },
            kind => FsError::Backing {
                path,
                source_index: None,
                kind,
                message: err.to_string(),
            },
        }
    }

    /// Attach the chain position of the link that produced this error.
    ///
    /// `NotFound` is returned as-is.
    pub fn in_source(mut self, index: usize) -> Self {
        match &mut self {
            FsError::NotFound(_) => {}
            FsError::PermissionDenied { source_index, .. }
            | FsError::Unsupported { source_index, .. }
            | FsError::ResolutionAmbiguous { source_index, .. }
            | FsError::Backing { source_index, .. } => *source_index = Some(index),
        }
        self
    }

    /// Chain position of the failing link, if known.
    pub fn source_index(&self) -> Option<usize> {
        match self {
            FsError::NotFound(_) => None,
            FsError::PermissionDenied { source_index, .. }
            | FsError::Unsupported { source_index, .. }
            | FsError::ResolutionAmbiguous { source_index, .. }
            | FsError::Backing { source_index, .. } => *source_index,
        }
    }

    /// Reclassify an error hit after a directory was already opened.
    ///
    /// A `NotFound` at that point is about an entry, not the directory, and
    /// means the listing is incomplete, so it becomes a backing fault that
    /// no caller will mistake for "directory absent".
    pub fn during_listing(self) -> Self {
        match self {
            FsError::NotFound(path) => FsError::Backing {
                path,
                source_index: None,
                kind: io::ErrorKind::NotFound,
                message: "vanished while listing".to_string(),
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, FsError::PermissionDenied { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, FsError::Unsupported { .. })
    }
}

/// Without a path the error cannot be classified against one, so it stays
/// an opaque backing fault. Use [`FsError::from_io`] when the path is known.
impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        FsError::Backing {
            path: String::new(),
            source_index: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
