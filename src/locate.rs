//! Index root discovery
//!
//! Finds the nearest ancestor directory holding a store file and computes
//! the prefix that scopes the current invocation. Ancestors are computed
//! lexically from the path's components; symlinks are never resolved.

use crate::config::STORE_FILENAME;
use crate::error::{DirftsError, Result};
use crate::store::Store;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Where an invocation runs: the index root and the prefix under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexScope {
    /// Absolute directory owning the store, no trailing separator
    pub root: PathBuf,
    /// `/`-separated path below `root`; empty means the whole tree
    pub prefix: String,
}

impl IndexScope {
    pub fn new(root: PathBuf, prefix: impl Into<String>) -> Self {
        Self {
            root,
            prefix: prefix.into(),
        }
    }

    /// Absolute directory the prefix names
    pub fn scope_dir(&self) -> PathBuf {
        if self.prefix.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.prefix)
        }
    }

    /// Caller-relative form of an index-relative path, if it lies in scope
    pub fn to_caller_path<'p>(&self, index_path: &'p str) -> Option<&'p str> {
        if self.prefix.is_empty() {
            return Some(index_path);
        }
        index_path
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

/// Find the store governing `start` and open it
pub fn locate(start: &Path) -> Result<(IndexScope, Store)> {
    let start = normalize(start)?;
    let mut candidate = start.clone();

    loop {
        let store_path = candidate.join(STORE_FILENAME);
        if store_path.is_file() {
            let prefix = crate::walker::relative_path(&candidate, &start).ok_or_else(|| {
                DirftsError::InvalidPath(format!("{:?} is not valid UTF-8", start))
            })?;
            debug!("Found index at {:?} (prefix {:?})", candidate, prefix);

            let store = Store::open(&store_path)?;
            return Ok((IndexScope::new(candidate, prefix), store));
        }

        if !candidate.pop() {
            return Err(DirftsError::NotFound);
        }
    }
}

/// Lexically normalize an absolute path: drop `.`, fold `..`, and strip
/// any trailing separator
pub fn normalize(path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(DirftsError::InvalidPath(format!(
            "{:?} is not an absolute path",
            path
        )));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
        }
    }
    Ok(normalized)
}
