//! Path helpers shared by the backing stores and the decorators.

use std::path::{Component, Path, PathBuf};

/// Lexically clean a path: drop `.`, fold `..`, strip trailing separators.
///
/// An absolute path stays absolute. Cleaning never touches the disk.
pub fn clean(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => result.push("/"),
            Component::CurDir => {}
            Component::ParentDir => {
                if result != Path::new("/") {
                    result.pop();
                }
            }
            Component::Normal(s) => result.push(s),
            Component::Prefix(_) => {}
        }
    }
    result
}

/// Clean a path and drop its leading `/`, giving a key relative to a store root.
pub fn relative(path: &Path) -> PathBuf {
    let cleaned = clean(path);
    match cleaned.strip_prefix("/") {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => cleaned,
    }
}

/// True for the synthetic root: any path that cleans to nothing or to a
/// lone separator (`""`, `/`, `//`, `/.`, `./`).
pub fn is_root(path: &Path) -> bool {
    let cleaned = clean(path);
    let s = cleaned.as_os_str();
    s.is_empty() || s == "/"
}
