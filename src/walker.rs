//! Directory traversal
//!
//! Lazily enumerates regular files under an index root, pruning excluded
//! directories and dropping excluded files as it goes.

use crate::error::{DirftsError, Result};
use crate::exclude::ExclusionSet;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A regular file seen during one walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnDiskEntry {
    /// Absolute path on disk
    pub full_path: PathBuf,
    /// Path relative to the index root, `/`-separated
    pub relative_path: String,
    /// Modification time in seconds since the epoch
    pub last_modified: i64,
    /// Size in bytes
    pub size: u64,
}

/// Depth-first walk of `root/subpath`, sorted by name within each directory
pub struct TreeWalker<'r> {
    root: PathBuf,
    rules: &'r ExclusionSet,
    inner: walkdir::IntoIter,
    ignored: usize,
    pruned: bool,
}

impl<'r> TreeWalker<'r> {
    /// Start a fresh walk; `subpath` is relative to `root` and may be empty.
    ///
    /// `subpath` may also name a single file, in which case the walk yields
    /// at most that file.
    ///
    /// If `subpath` or any directory above it is excluded, the walk yields
    /// nothing and counts one ignored entry.
    pub fn new(root: &Path, subpath: &str, rules: &'r ExclusionSet) -> Self {
        let pruned = rules.is_path_excluded(subpath);
        if pruned {
            debug!("Excluded walk start {}", subpath);
        }

        let start = if subpath.is_empty() {
            root.to_path_buf()
        } else {
            root.join(subpath)
        };

        let inner = WalkDir::new(start)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name()
            .into_iter();

        Self {
            root: root.to_path_buf(),
            rules,
            inner,
            ignored: usize::from(pruned),
            pruned,
        }
    }

    /// Entries dropped by exclusion rules so far (pruned directories count once)
    pub fn ignored(&self) -> usize {
        self.ignored
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = Result<OnDiskEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pruned {
            return None;
        }
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) {
                        debug!("Vanished during walk: {:?}", e.path());
                        continue;
                    }
                    return Some(Err(DirftsError::Walk(e)));
                }
            };

            let file_type = entry.file_type();

            let relative_path = match relative_path(&self.root, entry.path()) {
                Some(rel) => rel,
                None => {
                    warn!("Skipping non-UTF-8 path {:?}", entry.path());
                    self.ignored += 1;
                    if file_type.is_dir() {
                        self.inner.skip_current_dir();
                    }
                    continue;
                }
            };

            if !relative_path.is_empty() {
                let basename = entry.file_name().to_string_lossy();
                if self.rules.is_excluded(&basename, &relative_path) {
                    debug!("Excluded {}", relative_path);
                    self.ignored += 1;
                    if file_type.is_dir() {
                        self.inner.skip_current_dir();
                    }
                    continue;
                }
            }

            if file_type.is_dir() {
                continue;
            }
            if file_type.is_symlink() {
                debug!("Skipping symlink {}", relative_path);
                continue;
            }
            if !file_type.is_file() {
                warn!("Skipping non-regular file {}", relative_path);
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) {
                        debug!("Vanished before stat: {}", relative_path);
                        continue;
                    }
                    return Some(Err(DirftsError::Walk(e)));
                }
            };

            return Some(Ok(OnDiskEntry {
                full_path: entry.into_path(),
                relative_path,
                last_modified: mtime_secs(&metadata),
                size: metadata.len(),
            }));
        }
    }
}

/// `/`-joined path of `path` below `root`, or `None` if it is not below
/// `root` or not valid UTF-8. The root itself maps to the empty string.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rest = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rest.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Modification time in whole seconds since the epoch
pub fn mtime_secs(metadata: &Metadata) -> i64 {
    match metadata.modified() {
        Ok(time) => match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        },
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclude::ExclusionRule;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn walk_paths(root: &Path, subpath: &str, rules: &ExclusionSet) -> Vec<String> {
        TreeWalker::new(root, subpath, rules)
            .map(|e| e.unwrap().relative_path)
            .collect()
    }

    #[test]
    fn test_walk_is_sorted_and_relative() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b.txt", "b");
        touch(dir.path(), "a.txt", "a");
        touch(dir.path(), "sub/c.txt", "c");
        touch(dir.path(), "sub/deeper/d.txt", "d");

        let rules = ExclusionSet::empty();
        assert_eq!(
            walk_paths(dir.path(), "", &rules),
            vec!["a.txt", "b.txt", "sub/c.txt", "sub/deeper/d.txt"]
        );
        assert_eq!(
            walk_paths(dir.path(), "sub", &rules),
            vec!["sub/c.txt", "sub/deeper/d.txt"]
        );
    }

    #[test]
    fn test_walk_entry_fields() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.txt", "hello");

        let rules = ExclusionSet::empty();
        let entries: Vec<OnDiskEntry> = TreeWalker::new(dir.path(), "", &rules)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 5);
        assert_eq!(entries[0].full_path, dir.path().join("a.txt"));
        assert!(entries[0].last_modified > 0);
    }

    #[test]
    fn test_excluded_directories_are_pruned() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "keep.txt", "k");
        touch(dir.path(), "build/out.txt", "o");
        touch(dir.path(), "build/nested/more.txt", "m");
        touch(dir.path(), "src/build/x.txt", "x");

        let rules = ExclusionSet::compile(&[ExclusionRule::literal("build")]).unwrap();
        let mut walker = TreeWalker::new(dir.path(), "", &rules);
        let paths: Vec<String> = walker.by_ref().map(|e| e.unwrap().relative_path).collect();

        assert_eq!(paths, vec!["keep.txt"]);
        assert_eq!(walker.ignored(), 2);
    }

    #[test]
    fn test_regex_rule_uses_relative_path() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "docs/a.md", "a");
        touch(dir.path(), "src/docs.rs", "b");

        let rules = ExclusionSet::compile(&[ExclusionRule::regex("^docs/")]).unwrap();
        assert_eq!(walk_paths(dir.path(), "", &rules), vec!["src/docs.rs"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "real.txt", "r");
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let rules = ExclusionSet::empty();
        assert_eq!(walk_paths(dir.path(), "", &rules), vec!["real.txt"]);
    }

    #[test]
    fn test_missing_start_is_empty() {
        let dir = tempdir().unwrap();
        let rules = ExclusionSet::empty();
        assert!(walk_paths(dir.path(), "gone", &rules).is_empty());
    }

    #[test]
    fn test_walk_is_restartable() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.txt", "a");

        let rules = ExclusionSet::empty();
        let first = walk_paths(dir.path(), "", &rules);
        let second = walk_paths(dir.path(), "", &rules);
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_file_walk() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.txt", "abc");
        touch(dir.path(), "skip.log", "x");

        let rules = ExclusionSet::compile(&[ExclusionRule::glob("*.log")]).unwrap();

        assert_eq!(walk_paths(dir.path(), "a.txt", &rules), vec!["a.txt"]);
        assert!(walk_paths(dir.path(), "missing.txt", &rules).is_empty());

        let mut walker = TreeWalker::new(dir.path(), "skip.log", &rules);
        assert!(walker.next().is_none());
        assert_eq!(walker.ignored(), 1);
    }

    #[test]
    fn test_excluded_scope_directory() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "build/out.txt", "o");

        let rules = ExclusionSet::compile(&[ExclusionRule::literal("build")]).unwrap();
        assert!(walk_paths(dir.path(), "build", &rules).is_empty());
    }

    #[test]
    fn test_excluded_ancestor_prunes_walk() {
        let dir = tempdir().unwrap();
        touch(dir.path(), ".git/config", "c");
        touch(dir.path(), ".git/objects/pack", "p");

        let rules = ExclusionSet::compile(&[ExclusionRule::literal(".git")]).unwrap();

        let mut walker = TreeWalker::new(dir.path(), ".git/objects", &rules);
        assert!(walker.next().is_none());
        assert_eq!(walker.ignored(), 1);

        let mut walker = TreeWalker::new(dir.path(), ".git/config", &rules);
        assert!(walker.next().is_none());
        assert_eq!(walker.ignored(), 1);
    }

    #[test]
    fn test_walk_through_file_fails() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.txt", "abc");

        let rules = ExclusionSet::empty();
        let mut walker = TreeWalker::new(dir.path(), "a.txt/inner", &rules);
        assert!(matches!(walker.next(), Some(Err(DirftsError::Walk(_)))));
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/a");
        assert_eq!(relative_path(root, Path::new("/a/b/c.txt")).unwrap(), "b/c.txt");
        assert_eq!(relative_path(root, Path::new("/a")).unwrap(), "");
        assert!(relative_path(root, Path::new("/ab/c")).is_none());
    }
}
