//! Search functionality and result formatting
//!
//! Runs scoped queries against the store, maps result paths back to the
//! caller's directory, optionally flags results whose files changed since
//! the last sync, and formats results for terminal display or JSON output.

use crate::error::{DirftsError, Result};
use crate::locate::IndexScope;
use crate::store::{MatchOffset, SnippetStyle, Store, StoreMatch};
use crate::walker::mtime_secs;
use colored::*;
use regex::bytes::Regex as BytesRegex;
use serde::Serialize;
use tracing::{debug, warn};

/// How the query string is matched against document bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Full-text term query, ranked by the store
    #[default]
    Term,
    /// Regex scan over whole bodies; much slower, unavailable on compressed stores
    Regex,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Path relative to the search scope
    pub path: String,
    /// Match locations in the body
    pub offsets: Vec<MatchOffset>,
    /// Excerpt around the match, highlighted with the snippet style
    pub snippet: String,
}

/// Full-text searcher
#[derive(Debug, Clone)]
pub struct Searcher {
    mode: SearchMode,
    style: SnippetStyle,
    check_staleness: bool,
}

impl Searcher {
    pub fn new(mode: SearchMode, style: SnippetStyle) -> Self {
        Self {
            mode,
            style,
            check_staleness: false,
        }
    }

    /// Compare each hit against the file on disk
    pub fn with_staleness_check(mut self, check: bool) -> Self {
        self.check_staleness = check;
        self
    }

    /// Search documents under the scope's prefix
    pub fn search(&self, store: &mut Store, scope: &IndexScope, query: &str) -> Result<SearchResults> {
        let txn = store.transaction()?;

        let matches = match self.mode {
            SearchMode::Term => txn.query_term(query, &scope.prefix, &self.style)?,
            SearchMode::Regex => {
                if txn.compressed()? {
                    return Err(DirftsError::UnsupportedMode(
                        "regex search is not available on a compressed index".to_string(),
                    ));
                }
                let regex = BytesRegex::new(query)
                    .map_err(|e| DirftsError::InvalidQuery(e.to_string()))?;
                txn.query_regex(&regex, &scope.prefix, &self.style)?
            }
        };
        txn.commit()?;

        debug!("{} matches for {:?}", matches.len(), query);

        Ok(SearchResults {
            matches: matches.into_iter(),
            scope: scope.clone(),
            check_staleness: self.check_staleness,
            stale: 0,
            reported: false,
        })
    }
}

/// Results in store order; warns once about stale hits when drained
pub struct SearchResults {
    matches: std::vec::IntoIter<StoreMatch>,
    scope: IndexScope,
    check_staleness: bool,
    stale: usize,
    reported: bool,
}

impl SearchResults {
    /// Hits seen so far whose file changed or vanished since the last sync
    pub fn stale_count(&self) -> usize {
        self.stale
    }

    fn is_stale(&self, m: &StoreMatch) -> bool {
        match std::fs::symlink_metadata(self.scope.root.join(&m.path)) {
            Ok(metadata) => !metadata.is_file() || mtime_secs(&metadata) != m.last_modified,
            Err(_) => true,
        }
    }
}

impl Iterator for SearchResults {
    type Item = SearchResult;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(m) = self.matches.next() else {
            if !self.reported && self.stale > 0 {
                warn!(
                    "{} results may be out of date; run `dirfts sync`",
                    self.stale
                );
            }
            self.reported = true;
            return None;
        };

        if self.check_staleness && self.is_stale(&m) {
            debug!("Stale: {}", m.path);
            self.stale += 1;
        }

        let path = self
            .scope
            .to_caller_path(&m.path)
            .unwrap_or(&m.path)
            .to_string();

        Some(SearchResult {
            path,
            offsets: m.offsets,
            snippet: m.snippet,
        })
    }
}

/// Index statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Documents under the scope's prefix
    pub documents: usize,
    /// Number of exclusion rules
    pub rules: usize,
    /// Whether bodies are stored compressed
    pub compressed: bool,
}

/// Gather statistics for the scope
pub fn stats(store: &Store, scope: &IndexScope) -> Result<IndexStats> {
    Ok(IndexStats {
        documents: store.document_count(&scope.prefix)?,
        rules: store.list_rules()?.len(),
        compressed: store.compressed()?,
    })
}

/// Format search results for terminal display
pub fn format_results(results: &[SearchResult], show_snippets: bool) -> String {
    let mut output = String::new();

    for result in results {
        output.push_str(&format!("{}\n", result.path.cyan().bold()));

        if show_snippets && !result.snippet.is_empty() {
            for line in result.snippet.lines() {
                output.push_str(&format!("    {}\n", line));
            }
        }
    }

    output
}

/// Format results as JSON
pub fn format_results_json(results: &[SearchResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}
