//! # dirfts - Local full-text search over a directory tree
//!
//! Indexes the contents of a directory tree into a SQLite full-text store
//! and keeps that index synchronized with the filesystem.
//!
//! ## Features
//!
//! - **Nested scopes**: commands run from any subdirectory of an index and
//!   are restricted to that subdirectory
//! - **Incremental sync**: only new, changed, and deleted files touch the
//!   store, all inside one transaction
//! - **Exclusion rules**: literal names, globs, and path regexes
//! - **Staleness detection**: search can flag hits whose files changed
//!   since the last sync
//!
//! ## Example
//!
//! ```no_run
//! use dirfts::{locate, Config, Indexer, SearchMode, Searcher, SnippetStyle};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let (scope, mut store) = locate(Path::new("/home/me/notes"))?;
//!
//!     // Sync
//!     let config = Config::load(scope.root.clone(), &store)?;
//!     let stats = Indexer::new(config).sync(&mut store, &scope)?;
//!     println!("{}", stats);
//!
//!     // Search
//!     let searcher = Searcher::new(SearchMode::Term, SnippetStyle::plain())
//!         .with_staleness_check(true);
//!     for result in searcher.search(&mut store, &scope, "hello")? {
//!         println!("{}: {}", result.path, result.snippet);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod exclude;
pub mod indexer;
pub mod locate;
pub mod searcher;
pub mod store;
pub mod walker;
pub mod watcher;

// Re-export commonly used types
pub use config::{Config, STORE_FILENAME};
pub use error::{DirftsError, Result};
pub use exclude::{ExclusionRule, ExclusionSet, RuleKind};
pub use indexer::{Indexer, SyncPlan, SyncStats};
pub use locate::{locate, IndexScope};
pub use searcher::{
    format_results, format_results_json, stats, IndexStats, SearchMode, SearchResult,
    SearchResults, Searcher,
};
pub use store::{Document, MatchOffset, SnippetStyle, Store, StoreMatch, StoreTxn};
pub use walker::{OnDiskEntry, TreeWalker};
pub use watcher::IndexWatcher;
