//! Configuration types and constants for dirfts
//!
//! Per-index settings live in the store's `config` table; this module
//! names the keys, supplies defaults, and loads them into a [`Config`].

use crate::error::{DirftsError, Result};
use crate::store::Store;
use serde::Serialize;
use tracing::debug;
use std::path::PathBuf;

/// Well-known filename of the index store at an index root
pub const STORE_FILENAME: &str = ".fts.db";

/// Default cap on bytes read from a single file (10 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Config key gating regex search and body compression
pub const KEY_COMPRESSED: &str = "compressed";

/// Config key overriding [`DEFAULT_MAX_FILE_SIZE`]
pub const KEY_MAX_FILE_SIZE: &str = "max_file_size";

/// Configuration for one index
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory owning the index store
    pub root_path: PathBuf,
    /// Maximum number of bytes of a file handed to the store
    pub max_file_size: u64,
    /// Whether stored bodies are compressed
    pub compressed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            compressed: false,
        }
    }
}

impl Config {
    /// Create a new config for the given root path
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            ..Default::default()
        }
    }

    /// Set the read cap
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Load the settings persisted in a store
    pub fn load(root_path: PathBuf, store: &Store) -> Result<Self> {
        let compressed = store.compressed()?;
        let max_file_size = match store.get_config(KEY_MAX_FILE_SIZE)? {
            Some(value) => parse_size(&value)?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        Ok(Self {
            root_path,
            max_file_size,
            compressed,
        })
    }

    /// Change one setting by key. Compression is fixed when the index is
    /// created and cannot be set here.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            KEY_MAX_FILE_SIZE => {
                self.max_file_size = parse_size(value)?;
                debug!("{} = {}", key, self.max_file_size);
                Ok(())
            }
            KEY_COMPRESSED => Err(DirftsError::InvalidConfig(format!(
                "{} can only be chosen at init",
                key
            ))),
            _ => Err(DirftsError::InvalidConfig(format!("unknown key {:?}", key))),
        }
    }

    /// Persist the settings that may be changed after init
    pub fn save(&self, store: &Store) -> Result<()> {
        store.set_config(KEY_MAX_FILE_SIZE, &self.max_file_size.to_string())
    }
}

fn parse_size(value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        DirftsError::InvalidConfig(format!(
            "{} must be a byte count, got {:?}",
            KEY_MAX_FILE_SIZE, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert!(!config.compressed);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = Store::init(&root, false).unwrap();

        let loaded = Config::load(root.clone(), &store).unwrap();
        assert_eq!(loaded.max_file_size, DEFAULT_MAX_FILE_SIZE);

        Config::new(root.clone())
            .with_max_file_size(4096)
            .save(&store)
            .unwrap();

        let loaded = Config::load(root, &store).unwrap();
        assert_eq!(loaded.max_file_size, 4096);
        assert!(!loaded.compressed);
    }

    #[test]
    fn test_set_validates_keys_and_values() {
        let mut config = Config::new(PathBuf::from("/srv/docs"));

        config.set("max_file_size", "2048").unwrap();
        assert_eq!(config.max_file_size, 2048);

        assert!(matches!(
            config.set("max_file_size", "lots"),
            Err(DirftsError::InvalidConfig(_))
        ));
        assert!(matches!(
            config.set("compressed", "1"),
            Err(DirftsError::InvalidConfig(_))
        ));
        assert!(matches!(
            config.set("colour", "red"),
            Err(DirftsError::InvalidConfig(_))
        ));
        assert_eq!(config.max_file_size, 2048);
    }

    #[test]
    fn test_malformed_stored_size_is_an_error() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = Store::init(&root, false).unwrap();
        store.set_config(KEY_MAX_FILE_SIZE, "ten megs").unwrap();

        assert!(matches!(
            Config::load(root, &store),
            Err(DirftsError::InvalidConfig(_))
        ));
    }
}
