//! Handles returned by `open`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{FsError, FsResult};

/// How many entries a directory read may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadLimit {
    /// Every entry.
    #[default]
    All,
    /// At most this many entries.
    AtMost(usize),
}

impl ReadLimit {
    pub fn apply<T>(self, mut entries: Vec<T>) -> Vec<T> {
        if let ReadLimit::AtMost(n) = self {
            entries.truncate(n);
        }
        entries
    }
}

/// An open leaf file.
///
/// The stream belongs to the caller; dropping the handle closes it.
pub struct FileHandle {
    path: PathBuf,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            path: path.into(),
            reader: Box::pin(reader),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the underlying byte stream.
    pub fn reader(&mut self) -> Pin<&mut (dyn AsyncRead + Send + 'static)> {
        self.reader.as_mut()
    }

    /// Drain the stream into memory.
    pub async fn read_to_end(mut self) -> FsResult<Vec<u8>> {
        let mut data = Vec::new();
        self.reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| FsError::from_io(e, &self.path))?;
        Ok(data)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// An open directory.
///
/// Holds no backing resource; listing goes back through the filesystem that
/// opened it via [`Filesystem::read_dir`](super::Filesystem::read_dir).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirHandle {
    path: PathBuf,
    synthetic: bool,
}

impl DirHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            synthetic: false,
        }
    }

    /// A directory that exists only in the logical tree.
    pub fn synthetic(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            synthetic: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}

/// Result of `open`.
#[derive(Debug)]
pub enum Handle {
    File(FileHandle),
    Dir(DirHandle),
}

impl Handle {
    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }

    pub fn into_file(self) -> FsResult<FileHandle> {
        match self {
            Handle::File(f) => Ok(f),
            Handle::Dir(d) => Err(FsError::unsupported("read", d.path())),
        }
    }

    pub fn into_dir(self) -> FsResult<DirHandle> {
        match self {
            Handle::Dir(d) => Ok(d),
            Handle::File(f) => Err(FsError::unsupported("read_dir", f.path())),
        }
    }
}
