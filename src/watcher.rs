//! File system watcher for live index updates
//!
//! Watches the scoped directory and re-syncs the index as files change.
//! Uses debouncing to avoid excessive syncs on rapid changes.

use crate::config::STORE_FILENAME;
use crate::error::{DirftsError, Result};
use crate::indexer::{Indexer, SyncStats};
use crate::locate::IndexScope;
use crate::store::Store;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Debounce window for filesystem events
const DEBOUNCE: Duration = Duration::from_millis(500);

/// File system watcher for live index updates
pub struct IndexWatcher {
    scope: IndexScope,
    indexer: Indexer,
    store: Store,
}

impl IndexWatcher {
    /// Create a new watcher for an opened index
    pub fn new(scope: IndexScope, store: Store, indexer: Indexer) -> Self {
        Self {
            scope,
            indexer,
            store,
        }
    }

    /// Start watching for file changes
    ///
    /// This blocks until interrupted (Ctrl+C).
    pub fn watch(&mut self) -> Result<()> {
        let dir = self.scope.scope_dir();
        info!("Watching {:?} for changes...", dir);

        let stats = self.indexer.sync(&mut self.store, &self.scope)?;
        info!("Initial sync: {}", stats);

        let (tx, rx) = channel();

        let mut debouncer =
            new_debouncer(DEBOUNCE, tx).map_err(|e| DirftsError::Watch(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::Recursive)
            .map_err(|e| DirftsError::Watch(e.to_string()))?;

        println!(
            "\n✓ Index ready ({} documents)",
            self.store.document_count(&self.scope.prefix)?
        );
        println!("  Watching for changes. Press Ctrl+C to stop.\n");

        self.process_events(rx)
    }

    /// Process file system events from the watcher
    fn process_events(
        &mut self,
        rx: Receiver<std::result::Result<Vec<DebouncedEvent>, notify::Error>>,
    ) -> Result<()> {
        loop {
            match rx.recv() {
                Ok(Ok(events)) => {
                    let relevant = events
                        .iter()
                        .filter(|event| !is_store_file(&event.path))
                        .count();

                    if relevant > 0 {
                        let stats = self.handle_changes(relevant)?;
                        if stats.changed() {
                            println!(
                                "  Synced: +{} ~{} -{}",
                                stats.created, stats.updated, stats.deleted
                            );
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Watch error: {:?}", e);
                }
                Err(e) => {
                    debug!("Watch channel closed: {:?}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Re-sync the whole scope so deletions are picked up too
    fn handle_changes(&mut self, changed: usize) -> Result<SyncStats> {
        info!("Processing {} changed paths...", changed);
        self.indexer.sync(&mut self.store, &self.scope)
    }
}

/// Events on the store file and its journal come from our own writes
fn is_store_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(STORE_FILENAME))
        .unwrap_or(false)
}
