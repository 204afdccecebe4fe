//! Index synchronization
//!
//! Walks the scoped part of the tree, diffs it against the documents the
//! store already holds, and applies deletions, updates, and creations in
//! one exclusive transaction. A failure anywhere rolls the whole sync back.

use crate::config::Config;
use crate::error::{DirftsError, Result};
use crate::exclude::ExclusionSet;
use crate::locate::{normalize, IndexScope};
use crate::store::{Document, Store, StoreTxn};
use crate::walker::{relative_path, OnDiskEntry, TreeWalker};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Changes needed to bring the store in line with the disk
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// On-disk files with no document
    pub created: Vec<OnDiskEntry>,
    /// Documents whose file is newer than the stored timestamp
    pub updated: Vec<(i64, OnDiskEntry)>,
    /// Documents with no on-disk file
    pub deleted: Vec<Document>,
}

impl SyncPlan {
    /// Diff the on-disk set against stored documents.
    ///
    /// A file is only updated when its timestamp moved forward; a file whose
    /// timestamp went backwards keeps its stored body. Deletions are only
    /// computed when `detect_deletions` is set, which a sync of explicitly
    /// named files never does.
    pub fn diff(
        on_disk: BTreeMap<String, OnDiskEntry>,
        mut documents: HashMap<String, Document>,
        detect_deletions: bool,
    ) -> Self {
        let mut plan = Self::default();

        for (path, entry) in on_disk {
            match documents.remove(&path) {
                None => plan.created.push(entry),
                Some(doc) if doc.last_modified < entry.last_modified => {
                    plan.updated.push((doc.docid, entry))
                }
                Some(_) => {}
            }
        }

        if detect_deletions {
            plan.deleted = documents.into_values().collect();
            plan.deleted.sort_by(|a, b| a.path.cmp(&b.path));
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Synchronizes an index with the filesystem
pub struct Indexer {
    config: Config,
    progress: bool,
}

impl Indexer {
    /// Create a new indexer with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            progress: false,
        }
    }

    /// Show a spinner on stderr while syncing
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Sync everything under the scope's prefix, deleting documents whose
    /// files are gone
    pub fn sync(&self, store: &mut Store, scope: &IndexScope) -> Result<SyncStats> {
        self.run(store, scope, None)
    }

    /// Sync only the named files (caller-relative or absolute). Named
    /// directories are walked. Never deletes documents.
    pub fn sync_files(
        &self,
        store: &mut Store,
        scope: &IndexScope,
        files: &[PathBuf],
    ) -> Result<SyncStats> {
        self.run(store, scope, Some(files))
    }

    fn run(
        &self,
        store: &mut Store,
        scope: &IndexScope,
        files: Option<&[PathBuf]>,
    ) -> Result<SyncStats> {
        info!("Syncing {:?} (prefix {:?})", scope.root, scope.prefix);

        let pb = self.spinner();
        let mut stats = SyncStats::default();

        let txn = store.transaction()?;
        let rules = ExclusionSet::compile(&txn.exclusion_rules()?)?;

        pb.set_message("Scanning files...");
        let on_disk = match files {
            None => self.walk(&scope.root, &scope.prefix, &rules, &mut stats)?,
            Some(files) => {
                let mut on_disk = BTreeMap::new();
                for file in files {
                    let subpath = explicit_subpath(scope, file)?;
                    on_disk.append(&mut self.walk(&scope.root, &subpath, &rules, &mut stats)?);
                }
                on_disk
            }
        };
        debug!("Found {} files on disk", on_disk.len());

        let documents = txn.documents_under(&scope.prefix)?;
        let plan = SyncPlan::diff(on_disk, documents, files.is_none());

        if plan.is_empty() {
            debug!("Index already up to date");
        } else {
            pb.set_message("Applying changes...");
            self.apply(&txn, &plan, &mut stats, &pb)?;
        }

        txn.commit()?;
        pb.finish_and_clear();

        if stats.skipped > 0 {
            warn!("Skipped {} unreadable files", stats.skipped);
        }
        info!("{}", stats);

        Ok(stats)
    }

    /// Apply a plan in delete, update, create order. Files that vanished or
    /// became unreadable since the walk are counted as skipped.
    fn apply(
        &self,
        txn: &StoreTxn<'_>,
        plan: &SyncPlan,
        stats: &mut SyncStats,
        pb: &ProgressBar,
    ) -> Result<()> {
        for doc in &plan.deleted {
            debug!("Deleting {}", doc.path);
            txn.delete_document(doc.docid)?;
            stats.deleted += 1;
        }

        for (docid, entry) in &plan.updated {
            match self.read_body(entry)? {
                Some(body) => {
                    debug!("Updating {}", entry.relative_path);
                    txn.update_document(*docid, entry.last_modified, &body)?;
                    stats.updated += 1;
                }
                None => stats.skipped += 1,
            }
            pb.tick();
        }

        for entry in &plan.created {
            match self.read_body(entry)? {
                Some(body) => {
                    debug!("Adding new file {}", entry.relative_path);
                    txn.insert_document(&entry.relative_path, entry.last_modified, &body)?;
                    stats.created += 1;
                }
                None => stats.skipped += 1,
            }
            pb.tick();
        }

        Ok(())
    }

    /// Drain one walk into a path-keyed set
    fn walk(
        &self,
        root: &Path,
        subpath: &str,
        rules: &ExclusionSet,
        stats: &mut SyncStats,
    ) -> Result<BTreeMap<String, OnDiskEntry>> {
        let mut walker = TreeWalker::new(root, subpath, rules);
        let mut on_disk = BTreeMap::new();
        for entry in walker.by_ref() {
            let entry = entry?;
            on_disk.insert(entry.relative_path.clone(), entry);
        }
        stats.ignored += walker.ignored();
        Ok(on_disk)
    }

    /// Read at most `max_file_size` bytes; `None` if the file vanished or
    /// cannot be read
    fn read_body(&self, entry: &OnDiskEntry) -> Result<Option<Vec<u8>>> {
        let file = match File::open(&entry.full_path) {
            Ok(file) => file,
            Err(e) if is_soft_skip(&e) => {
                warn!("Skipping {}: {}", entry.relative_path, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let cap = self.config.max_file_size;
        let mut body = Vec::with_capacity(entry.size.min(cap) as usize);
        match file.take(cap).read_to_end(&mut body) {
            Ok(_) => {}
            Err(e) if is_soft_skip(&e) => {
                warn!("Skipping {}: {}", entry.relative_path, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        if entry.size > cap {
            debug!(
                "Truncated {} to {} of {} bytes",
                entry.relative_path, cap, entry.size
            );
        }
        Ok(Some(body))
    }

    fn spinner(&self) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

/// Per-file races that skip the file instead of failing the sync
fn is_soft_skip(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied)
}

/// Index-relative path of an explicitly named file, which must lie in scope
fn explicit_subpath(scope: &IndexScope, file: &Path) -> Result<String> {
    let full = normalize(&scope.scope_dir().join(file))?;
    let rel = relative_path(&scope.root, &full)
        .ok_or_else(|| DirftsError::InvalidPath(format!("{:?} is outside the index", file)))?;

    let in_scope = scope.prefix.is_empty()
        || rel == scope.prefix
        || scope.to_caller_path(&rel).is_some();
    if !in_scope {
        return Err(DirftsError::InvalidPath(format!(
            "{:?} is outside {:?}",
            file, scope.prefix
        )));
    }
    Ok(rel)
}

/// Outcome counts of one sync
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    /// Documents added for new files
    pub created: usize,
    /// Documents refreshed from newer files
    pub updated: usize,
    /// Documents removed for vanished files
    pub deleted: usize,
    /// Entries dropped by exclusion rules
    pub ignored: usize,
    /// Files that vanished or were unreadable at read time
    pub skipped: usize,
}

impl SyncStats {
    /// Whether the sync changed the store
    pub fn changed(&self) -> bool {
        self.created > 0 || self.updated > 0 || self.deleted > 0
    }
}

impl std::fmt::Display for SyncStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} new documents, {} updates, {} deletes, {} ignored",
            self.created, self.updated, self.deleted, self.ignored
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}
