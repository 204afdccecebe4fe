//! Full-text document store backed by SQLite FTS4
//!
//! The store owns everything persisted about an index: document metadata,
//! document bodies (in the `files_fts` virtual table, keyed by the same
//! docid), exclusion rules, and per-index config. Every sync or search
//! session runs inside one exclusive [`StoreTxn`]; dropping it without
//! calling [`StoreTxn::commit`] rolls the session back.

use crate::config::{KEY_COMPRESSED, STORE_FILENAME};
use crate::error::{DirftsError, Result};
use crate::exclude::{default_rules, ExclusionRule, RuleKind};
use regex::bytes::Regex as BytesRegex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Bytes of context kept on each side of a regex match in snippets
const REGEX_SNIPPET_CONTEXT: usize = 40;

/// Tokens per FTS4 snippet
const SNIPPET_TOKENS: i64 = 15;

/// Persisted metadata for one indexed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub docid: i64,
    /// Index-relative path, `/`-separated
    pub path: String,
    pub last_modified: i64,
}

/// One match location inside a document body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchOffset {
    /// Column of the FTS table (always 0, the body)
    pub column: u32,
    /// Index of the query term that matched
    pub term: u32,
    /// Byte offset of the match in the body
    pub offset: usize,
    /// Length of the match in bytes
    pub length: usize,
}

/// Markers wrapped around snippet highlights
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetStyle {
    pub start: String,
    pub end: String,
    pub ellipsis: String,
}

impl SnippetStyle {
    /// ANSI bold red highlights for terminals
    pub fn ansi() -> Self {
        Self {
            start: "\x1b[1;31m".to_string(),
            end: "\x1b[0m".to_string(),
            ellipsis: "...".to_string(),
        }
    }

    /// No markers at all, used when color output is off
    pub fn plain() -> Self {
        Self {
            start: String::new(),
            end: String::new(),
            ellipsis: String::new(),
        }
    }
}

impl Default for SnippetStyle {
    fn default() -> Self {
        Self::plain()
    }
}

/// A ranked match as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreMatch {
    /// Index-relative path
    pub path: String,
    pub last_modified: i64,
    pub offsets: Vec<MatchOffset>,
    pub snippet: String,
}

/// Handle to one index store file
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl Store {
    /// Open an existing store file read/write
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DirftsError::NotFound);
        }
        let conn = connect(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        debug!("Opened store {:?}", path);

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Create a new store at `root`, seeded with the default exclusion rules
    pub fn init(root: &Path, compressed: bool) -> Result<Self> {
        let path = root.join(STORE_FILENAME);
        if path.exists() {
            return Err(DirftsError::AlreadyExists(path.display().to_string()));
        }

        let conn = connect(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        let mut store = Self { conn, path };

        let tx = store
            .conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)?;
        create_schema(&tx, compressed)?;
        for rule in default_rules() {
            tx.execute(
                "INSERT INTO exclusions(type, expression) VALUES (?1, ?2)",
                params![rule.kind.as_str(), rule.pattern],
            )?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO config(key, value) VALUES (?1, ?2)",
            params![KEY_COMPRESSED, if compressed { "1" } else { "0" }],
        )?;
        tx.commit()?;

        info!("Created {:?}", store.path);
        Ok(store)
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begin an exclusive session
    pub fn transaction(&mut self) -> Result<StoreTxn<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)?;
        Ok(StoreTxn { tx })
    }

    /// Read a config value
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        get_config(&self.conn, key)
    }

    /// Write a config value
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config(key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Whether document bodies are stored compressed
    pub fn compressed(&self) -> Result<bool> {
        Ok(self.get_config(KEY_COMPRESSED)?.as_deref() == Some("1"))
    }

    /// All exclusion rules with their ids, in id order
    pub fn list_rules(&self) -> Result<Vec<(i64, ExclusionRule)>> {
        list_rules(&self.conn)
    }

    /// Validate and persist a new exclusion rule
    pub fn add_rule(&self, rule: &ExclusionRule) -> Result<i64> {
        rule.compile()?;
        self.conn.execute(
            "INSERT INTO exclusions(type, expression) VALUES (?1, ?2)",
            params![rule.kind.as_str(), rule.pattern],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Added exclusion {} ({})", id, rule);
        Ok(id)
    }

    /// Remove an exclusion rule by id
    pub fn remove_rule(&self, id: i64) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM exclusions WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(DirftsError::RuleNotFound(id));
        }
        debug!("Removed exclusion {}", id);
        Ok(())
    }

    /// Number of documents under `prefix` (empty = whole index)
    pub fn document_count(&self, prefix: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE (?1 = '' OR substr(path, 1, length(?1)) = ?1)",
            params![scope_pattern(prefix)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Merge FTS segments and compact the store file
    pub fn optimize(&mut self) -> Result<()> {
        info!("Optimizing {:?}", self.path);
        self.conn
            .execute("INSERT INTO files_fts(files_fts) VALUES ('optimize')", [])?;
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

/// An exclusive session against a [`Store`]
pub struct StoreTxn<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl StoreTxn<'_> {
    /// Snapshot of the exclusion rules
    pub fn exclusion_rules(&self) -> Result<Vec<ExclusionRule>> {
        Ok(list_rules(&self.tx)?.into_iter().map(|(_, rule)| rule).collect())
    }

    /// Whether document bodies are stored compressed
    pub fn compressed(&self) -> Result<bool> {
        Ok(get_config(&self.tx, KEY_COMPRESSED)?.as_deref() == Some("1"))
    }

    /// Documents under `prefix`, keyed by path
    pub fn documents_under(&self, prefix: &str) -> Result<HashMap<String, Document>> {
        let mut stmt = self.tx.prepare(
            "SELECT docid, path, last_modified FROM files
              WHERE (?1 = '' OR substr(path, 1, length(?1)) = ?1)",
        )?;
        let rows = stmt.query_map(params![scope_pattern(prefix)], |row| {
            Ok(Document {
                docid: row.get(0)?,
                path: row.get(1)?,
                last_modified: row.get(2)?,
            })
        })?;

        let mut documents = HashMap::new();
        for row in rows {
            let doc = row?;
            documents.insert(doc.path.clone(), doc);
        }
        Ok(documents)
    }

    /// Add a document, returning its new docid
    pub fn insert_document(&self, path: &str, last_modified: i64, body: &[u8]) -> Result<i64> {
        self.tx
            .prepare_cached("INSERT INTO files(path, last_modified) VALUES (?1, ?2)")?
            .execute(params![path, last_modified])?;
        let docid = self.tx.last_insert_rowid();
        self.tx
            .prepare_cached("INSERT INTO files_fts(docid, body) VALUES (?1, ?2)")?
            .execute(params![docid, body])?;
        Ok(docid)
    }

    /// Replace a document's timestamp and body
    pub fn update_document(&self, docid: i64, last_modified: i64, body: &[u8]) -> Result<()> {
        self.tx
            .prepare_cached("UPDATE files SET last_modified = ?1 WHERE docid = ?2")?
            .execute(params![last_modified, docid])?;
        self.tx
            .prepare_cached("UPDATE files_fts SET body = ?1 WHERE docid = ?2")?
            .execute(params![body, docid])?;
        Ok(())
    }

    /// Remove a document and its body
    pub fn delete_document(&self, docid: i64) -> Result<()> {
        self.tx
            .prepare_cached("DELETE FROM files WHERE docid = ?1")?
            .execute(params![docid])?;
        self.tx
            .prepare_cached("DELETE FROM files_fts WHERE docid = ?1")?
            .execute(params![docid])?;
        Ok(())
    }

    /// Full-text term query, best match first
    pub fn query_term(
        &self,
        term: &str,
        prefix: &str,
        style: &SnippetStyle,
    ) -> Result<Vec<StoreMatch>> {
        let mut stmt = self.tx.prepare(
            "SELECT f.path, f.last_modified, offsets(files_fts),
                    CAST(snippet(files_fts, ?1, ?2, ?3, -1, ?4) AS BLOB),
                    fts_rank(matchinfo(files_fts, 'pcx')) AS score
               FROM files_fts
               JOIN files f ON f.docid = files_fts.docid
              WHERE files_fts MATCH ?5
                AND (?6 = '' OR substr(f.path, 1, length(?6)) = ?6)
              ORDER BY score DESC, f.path",
        )?;

        let rows = stmt
            .query_map(
                params![
                    style.start,
                    style.end,
                    style.ellipsis,
                    SNIPPET_TOKENS,
                    term,
                    scope_pattern(prefix)
                ],
                |row| {
                    let offsets: String = row.get(2)?;
                    let snippet: Vec<u8> = row.get(3)?;
                    Ok(StoreMatch {
                        path: row.get(0)?,
                        last_modified: row.get(1)?,
                        offsets: parse_offsets(&offsets),
                        snippet: String::from_utf8_lossy(&snippet).into_owned(),
                    })
                },
            )
            .map_err(|e| match_error(term, e))?;

        // FTS parses the MATCH expression on the first step
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| match_error(term, e))
    }

    /// Whole-body regex scan, in path order
    pub fn query_regex(
        &self,
        regex: &BytesRegex,
        prefix: &str,
        style: &SnippetStyle,
    ) -> Result<Vec<StoreMatch>> {
        let mut stmt = self.tx.prepare(
            "SELECT f.path, f.last_modified, CAST(ft.body AS BLOB)
               FROM files f
               JOIN files_fts ft ON ft.docid = f.docid
              WHERE (?1 = '' OR substr(f.path, 1, length(?1)) = ?1)
                AND ft.body REGEXP ?2
              ORDER BY f.path",
        )?;

        let rows = stmt.query_map(params![scope_pattern(prefix), regex.as_str()], |row| {
            let path: String = row.get(0)?;
            let last_modified: i64 = row.get(1)?;
            let body: Vec<u8> = row.get(2)?;
            Ok((path, last_modified, body))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (path, last_modified, body) = row?;
            let offsets: Vec<MatchOffset> = regex
                .find_iter(&body)
                .map(|m| MatchOffset {
                    column: 0,
                    term: 0,
                    offset: m.start(),
                    length: m.len(),
                })
                .collect();
            let snippet = regex_snippet(&body, offsets.first(), style);
            matches.push(StoreMatch {
                path,
                last_modified,
                offsets,
                snippet,
            });
        }
        Ok(matches)
    }

    /// Make the session's changes permanent
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn connect(path: &Path, flags: OpenFlags) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, flags)?;
    register_functions(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection, compressed: bool) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS config (
            key   TEXT PRIMARY KEY,
            value
        );

        CREATE TABLE IF NOT EXISTS exclusions (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            type       TEXT NOT NULL COLLATE BINARY,
            expression TEXT NOT NULL COLLATE BINARY
        );

        -- docid is shared with files_fts
        CREATE TABLE IF NOT EXISTS files (
            docid         INTEGER PRIMARY KEY AUTOINCREMENT,
            path          TEXT NOT NULL UNIQUE COLLATE BINARY,
            last_modified INTEGER NOT NULL
        );
        ",
    )?;

    let fts = if compressed {
        "CREATE VIRTUAL TABLE IF NOT EXISTS files_fts USING fts4(
            body, compress=fts_compress, uncompress=fts_uncompress
        );"
    } else {
        "CREATE VIRTUAL TABLE IF NOT EXISTS files_fts USING fts4(body);"
    };
    conn.execute_batch(fts)?;
    Ok(())
}

fn register_functions(conn: &Connection) -> Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    // X REGEXP Y calls regexp(Y, X)
    conn.create_scalar_function("regexp", 2, flags, |ctx| {
        let regex = ctx.get_or_create_aux(0, |pattern| -> std::result::Result<_, BoxError> {
            Ok(BytesRegex::new(pattern.as_str()?)?)
        })?;
        match ctx.get_raw(1) {
            ValueRef::Null => Ok(false),
            value => {
                let bytes = value
                    .as_bytes()
                    .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
                Ok(regex.is_match(bytes))
            }
        }
    })?;

    conn.create_scalar_function("fts_rank", 1, flags, |ctx| {
        let blob = ctx
            .get_raw(0)
            .as_blob()
            .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
        Ok(rank_matchinfo(blob))
    })?;

    conn.create_scalar_function("fts_compress", 1, flags, |ctx| match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        value => {
            let bytes = value
                .as_bytes()
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            zstd::encode_all(bytes, 3)
                .map(Some)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
        }
    })?;

    conn.create_scalar_function("fts_uncompress", 1, flags, |ctx| match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        value => {
            let bytes = value
                .as_bytes()
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            zstd::decode_all(bytes)
                .map(Some)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
        }
    })?;

    Ok(())
}

/// A malformed MATCH expression comes back from FTS as a generic SQLite
/// error; report it as a bad query instead
fn match_error(term: &str, e: rusqlite::Error) -> DirftsError {
    match &e {
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("MATCH") => {
            DirftsError::InvalidQuery(format!("{:?}: {}", term, msg))
        }
        _ => e.into(),
    }
}

fn get_config(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT CAST(value AS TEXT) FROM config WHERE key = ?1",
            params![key],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(value.flatten())
}

fn list_rules(conn: &Connection) -> Result<Vec<(i64, ExclusionRule)>> {
    let mut stmt = conn.prepare("SELECT id, type, expression FROM exclusions ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut rules = Vec::new();
    for row in rows {
        let (id, kind, pattern) = row?;
        let kind: RuleKind = kind.parse()?;
        rules.push((id, ExclusionRule::new(kind, pattern)));
    }
    Ok(rules)
}

/// SQL pattern for the prefix filter: empty, or the prefix plus a trailing
/// separator so `b` never matches `bc/...`
fn scope_pattern(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix)
    }
}

/// Parse FTS4 `offsets()` output: groups of four integers
fn parse_offsets(raw: &str) -> Vec<MatchOffset> {
    let numbers: Vec<usize> = raw
        .split_ascii_whitespace()
        .filter_map(|n| n.parse().ok())
        .collect();

    numbers
        .chunks_exact(4)
        .map(|group| MatchOffset {
            column: group[0] as u32,
            term: group[1] as u32,
            offset: group[2],
            length: group[3],
        })
        .collect()
}

/// Score a row from `matchinfo(..., 'pcx')`: the sum over phrases and
/// columns of this row's hits divided by hits across all rows
fn rank_matchinfo(blob: &[u8]) -> f64 {
    let ints: Vec<u32> = blob
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if ints.len() < 2 {
        return 0.0;
    }

    let phrases = ints[0] as usize;
    let columns = ints[1] as usize;
    let mut score = 0.0;
    for phrase in 0..phrases {
        for column in 0..columns {
            let base = 2 + 3 * (phrase * columns + column);
            if let (Some(&hits), Some(&total)) = (ints.get(base), ints.get(base + 1)) {
                if hits > 0 && total > 0 {
                    score += f64::from(hits) / f64::from(total);
                }
            }
        }
    }
    score
}

/// Snippet around the first regex match
fn regex_snippet(body: &[u8], first: Option<&MatchOffset>, style: &SnippetStyle) -> String {
    let Some(m) = first else {
        return String::new();
    };

    let start = m.offset.saturating_sub(REGEX_SNIPPET_CONTEXT);
    let end = (m.offset + m.length + REGEX_SNIPPET_CONTEXT).min(body.len());

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str(&style.ellipsis);
    }
    snippet.push_str(&String::from_utf8_lossy(&body[start..m.offset]));
    snippet.push_str(&style.start);
    snippet.push_str(&String::from_utf8_lossy(
        &body[m.offset..m.offset + m.length],
    ));
    snippet.push_str(&style.end);
    snippet.push_str(&String::from_utf8_lossy(&body[m.offset + m.length..end]));
    if end < body.len() {
        snippet.push_str(&style.ellipsis);
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn paths(matches: &[StoreMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.path.as_str()).collect()
    }

    #[test]
    fn test_init_and_reopen() {
        let dir = tempdir().unwrap();
        let store = Store::init(dir.path(), false).unwrap();
        assert_eq!(store.path(), dir.path().join(".fts.db"));
        assert!(!store.compressed().unwrap());
        drop(store);

        let store = Store::open(&dir.path().join(".fts.db")).unwrap();
        assert_eq!(store.list_rules().unwrap().len(), default_rules().len());
    }

    #[test]
    fn test_init_refuses_existing() {
        let dir = tempdir().unwrap();
        Store::init(dir.path(), false).unwrap();
        assert!(matches!(
            Store::init(dir.path(), false),
            Err(DirftsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Store::open(&dir.path().join(".fts.db")),
            Err(DirftsError::NotFound)
        ));
    }

    #[test]
    fn test_rule_management() {
        let dir = tempdir().unwrap();
        let store = Store::init(dir.path(), false).unwrap();

        let id = store.add_rule(&ExclusionRule::glob("*.tmp")).unwrap();
        let rules = store.list_rules().unwrap();
        assert_eq!(rules.last().unwrap(), &(id, ExclusionRule::glob("*.tmp")));

        assert!(matches!(
            store.add_rule(&ExclusionRule::regex("(")),
            Err(DirftsError::InvalidRule(_))
        ));

        store.remove_rule(id).unwrap();
        assert!(!store.list_rules().unwrap().iter().any(|(i, _)| *i == id));
        assert!(matches!(
            store.remove_rule(id),
            Err(DirftsError::RuleNotFound(_))
        ));
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let store = Store::init(dir.path(), false).unwrap();
        assert_eq!(store.get_config("missing").unwrap(), None);
        store.set_config("k", "v").unwrap();
        assert_eq!(store.get_config("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_document_lifecycle() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        let txn = store.transaction().unwrap();
        let a = txn.insert_document("a.txt", 100, b"hello world").unwrap();
        let b = txn.insert_document("sub/b.txt", 100, b"goodbye").unwrap();
        assert_ne!(a, b);

        let found = txn.query_term("hello", "", &SnippetStyle::plain()).unwrap();
        assert_eq!(paths(&found), vec!["a.txt"]);
        assert_eq!(
            found[0].offsets,
            vec![MatchOffset {
                column: 0,
                term: 0,
                offset: 0,
                length: 5
            }]
        );

        txn.update_document(a, 200, b"fresh words").unwrap();
        assert!(txn.query_term("hello", "", &SnippetStyle::plain()).unwrap().is_empty());
        assert_eq!(txn.documents_under("").unwrap()["a.txt"].last_modified, 200);

        txn.delete_document(b).unwrap();
        assert!(txn.query_term("goodbye", "", &SnippetStyle::plain()).unwrap().is_empty());
        assert!(!txn.documents_under("sub").unwrap().contains_key("sub/b.txt"));
        txn.commit().unwrap();

        assert_eq!(store.document_count("").unwrap(), 1);
    }

    #[test]
    fn test_docids_not_reused() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        let txn = store.transaction().unwrap();
        let first = txn.insert_document("a.txt", 1, b"x").unwrap();
        txn.delete_document(first).unwrap();
        let second = txn.insert_document("a.txt", 1, b"x").unwrap();
        assert!(second > first);
        txn.commit().unwrap();
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        {
            let txn = store.transaction().unwrap();
            txn.insert_document("a.txt", 1, b"lost").unwrap();
        }

        assert_eq!(store.document_count("").unwrap(), 0);
    }

    #[test]
    fn test_prefix_respects_segment_boundary() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        let txn = store.transaction().unwrap();
        txn.insert_document("b/c.txt", 1, b"needle").unwrap();
        txn.insert_document("bc/d.txt", 1, b"needle").unwrap();

        let style = SnippetStyle::plain();
        assert_eq!(paths(&txn.query_term("needle", "b", &style).unwrap()), vec!["b/c.txt"]);
        assert_eq!(paths(&txn.query_term("needle", "bc", &style).unwrap()), vec!["bc/d.txt"]);
        assert_eq!(txn.query_term("needle", "", &style).unwrap().len(), 2);

        assert_eq!(txn.documents_under("b").unwrap().len(), 1);
        assert_eq!(txn.documents_under("").unwrap().len(), 2);
        txn.commit().unwrap();
    }

    #[test]
    fn test_ranking_prefers_more_hits() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        let txn = store.transaction().unwrap();
        txn.insert_document("once.txt", 1, b"apple pear plum").unwrap();
        txn.insert_document("thrice.txt", 1, b"apple apple apple").unwrap();

        let found = txn.query_term("apple", "", &SnippetStyle::plain()).unwrap();
        assert_eq!(paths(&found), vec!["thrice.txt", "once.txt"]);
        txn.commit().unwrap();
    }

    #[test]
    fn test_snippet_markers() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        let txn = store.transaction().unwrap();
        txn.insert_document("a.txt", 1, b"the quick brown fox").unwrap();

        let style = SnippetStyle {
            start: "[".to_string(),
            end: "]".to_string(),
            ellipsis: "~".to_string(),
        };
        let found = txn.query_term("quick", "", &style).unwrap();
        assert!(found[0].snippet.contains("[quick]"));
        txn.commit().unwrap();
    }

    #[test]
    fn test_plain_snippet_has_no_markers() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        let body = format!("{}needle{}", "a ".repeat(60), " b".repeat(60));
        let txn = store.transaction().unwrap();
        txn.insert_document("a.txt", 1, body.as_bytes()).unwrap();

        let regex = BytesRegex::new("needle").unwrap();
        let plain = txn.query_regex(&regex, "", &SnippetStyle::plain()).unwrap();
        assert!(plain[0].snippet.contains("needle"));
        assert!(!plain[0].snippet.contains("..."));
        assert!(!plain[0].snippet.contains('\x1b'));

        let ansi = txn.query_regex(&regex, "", &SnippetStyle::ansi()).unwrap();
        assert!(ansi[0].snippet.starts_with("..."));
        assert!(ansi[0].snippet.contains("\x1b[1;31mneedle\x1b[0m"));
        txn.commit().unwrap();
    }

    #[test]
    fn test_malformed_match_expression_is_invalid_query() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        let txn = store.transaction().unwrap();
        txn.insert_document("a.txt", 1, b"hello world").unwrap();

        let result = txn.query_term("\"hello", "", &SnippetStyle::plain());
        assert!(matches!(result, Err(DirftsError::InvalidQuery(_))));
        assert_eq!(
            paths(&txn.query_term("\"hello world\"", "", &SnippetStyle::plain()).unwrap()),
            vec!["a.txt"]
        );
    }

    #[test]
    fn test_regex_query() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();

        let txn = store.transaction().unwrap();
        txn.insert_document("a.txt", 1, b"error code 404 here").unwrap();
        txn.insert_document("b.txt", 1, b"all fine").unwrap();
        txn.insert_document("c.bin", 1, &[0xff, 0xfe, b'4', b'0', b'4']).unwrap();

        let regex = BytesRegex::new(r"\d{3}").unwrap();
        let found = txn.query_regex(&regex, "", &SnippetStyle::plain()).unwrap();
        assert_eq!(paths(&found), vec!["a.txt", "c.bin"]);
        assert_eq!(found[0].offsets[0].offset, 11);
        assert_eq!(found[0].offsets[0].length, 3);
        assert!(found[0].snippet.contains("404"));
        txn.commit().unwrap();
    }

    #[test]
    fn test_compressed_store_still_matches_terms() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), true).unwrap();
        assert!(store.compressed().unwrap());

        let txn = store.transaction().unwrap();
        txn.insert_document("a.txt", 1, b"compressible compressible text")
            .unwrap();
        let found = txn.query_term("text", "", &SnippetStyle::plain()).unwrap();
        assert_eq!(paths(&found), vec!["a.txt"]);
        txn.commit().unwrap();
    }

    #[test]
    fn test_optimize() {
        let dir = tempdir().unwrap();
        let mut store = Store::init(dir.path(), false).unwrap();
        {
            let txn = store.transaction().unwrap();
            txn.insert_document("a.txt", 1, b"some words").unwrap();
            txn.commit().unwrap();
        }
        store.optimize().unwrap();
        assert_eq!(store.document_count("").unwrap(), 1);
    }

    #[test]
    fn test_parse_offsets() {
        let offsets = parse_offsets("0 0 6 5 0 1 12 3");
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[1].term, 1);
        assert_eq!(offsets[1].offset, 12);
        assert!(parse_offsets("").is_empty());
    }

    #[test]
    fn test_scope_pattern() {
        assert_eq!(scope_pattern(""), "");
        assert_eq!(scope_pattern("b"), "b/");
        assert_eq!(scope_pattern("b/c/"), "b/c/");
    }
}
