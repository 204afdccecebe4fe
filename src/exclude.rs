//! Exclusion rules
//!
//! Three rule kinds decide whether a walked entry is left out of the index:
//! literal and glob rules look at the entry's basename, regex rules search
//! the whole index-relative path. Rules are compiled once per sync and
//! reused for every entry of the walk.

use crate::error::{DirftsError, Result};
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

/// Kind of an exclusion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Exact basename equality
    Literal,
    /// Shell-style glob against the basename
    Glob,
    /// Regex search against the index-relative path
    Regex,
}

impl RuleKind {
    /// Name stored in the `exclusions` table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Literal => "simple",
            Self::Glob => "glob",
            Self::Regex => "re",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleKind {
    type Err = DirftsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "simple" | "literal" => Ok(Self::Literal),
            "glob" => Ok(Self::Glob),
            "re" | "regex" => Ok(Self::Regex),
            _ => Err(DirftsError::InvalidRule(format!(
                "Unknown rule kind: {}. Valid options: literal, glob, regex",
                s
            ))),
        }
    }
}

/// A persisted exclusion rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule {
    pub kind: RuleKind,
    pub pattern: String,
}

impl ExclusionRule {
    pub fn new(kind: RuleKind, pattern: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }

    pub fn literal(pattern: impl Into<String>) -> Self {
        Self::new(RuleKind::Literal, pattern)
    }

    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::new(RuleKind::Glob, pattern)
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(RuleKind::Regex, pattern)
    }

    /// Compile the rule, rejecting malformed patterns
    pub fn compile(&self) -> Result<CompiledRule> {
        if self.pattern.is_empty() {
            return Err(DirftsError::InvalidRule(format!(
                "empty {} pattern",
                self.kind
            )));
        }

        match self.kind {
            RuleKind::Literal => Ok(CompiledRule::Literal(self.pattern.clone())),
            RuleKind::Glob => {
                let glob = GlobBuilder::new(&self.pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| DirftsError::InvalidRule(format!("{}: {}", self.pattern, e)))?;
                Ok(CompiledRule::Glob(glob.compile_matcher()))
            }
            RuleKind::Regex => {
                let regex = Regex::new(&self.pattern)
                    .map_err(|e| DirftsError::InvalidRule(format!("{}: {}", self.pattern, e)))?;
                Ok(CompiledRule::Regex(regex))
            }
        }
    }
}

impl std::fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}", self.kind, self.pattern)
    }
}

/// A rule ready for matching
#[derive(Debug, Clone)]
pub enum CompiledRule {
    Literal(String),
    Glob(GlobMatcher),
    Regex(Regex),
}

impl CompiledRule {
    /// Check a candidate; `relative_path` is `/`-separated from the index root
    pub fn matches(&self, basename: &str, relative_path: &str) -> bool {
        match self {
            Self::Literal(name) => name == basename,
            Self::Glob(glob) => glob.is_match(basename),
            Self::Regex(regex) => regex.is_match(relative_path),
        }
    }
}

/// Snapshot of compiled rules for one walk
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    rules: Vec<CompiledRule>,
}

impl ExclusionSet {
    /// Compile every rule; any malformed rule rejects the whole set
    pub fn compile<'a, I>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a ExclusionRule>,
    {
        let rules = rules
            .into_iter()
            .map(ExclusionRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// A set that excludes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if any rule matches
    pub fn is_excluded(&self, basename: &str, relative_path: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.matches(basename, relative_path))
    }

    /// True if `relative_path` or any directory above it is excluded.
    ///
    /// Each component is checked with its own basename and the path up to
    /// and including it, the same way the walk checks entries.
    pub fn is_path_excluded(&self, relative_path: &str) -> bool {
        relative_path
            .match_indices('/')
            .map(|(end, _)| end)
            .chain(std::iter::once(relative_path.len()))
            .any(|end| {
                let path = &relative_path[..end];
                let basename = path.rsplit('/').next().unwrap_or(path);
                !basename.is_empty() && self.is_excluded(basename, path)
            })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Rules seeded into every new index
pub fn default_rules() -> Vec<ExclusionRule> {
    vec![
        // the store file and its SQLite journal
        ExclusionRule::glob(format!("{}*", crate::config::STORE_FILENAME)),
        ExclusionRule::literal(".git"),
    ]
}
