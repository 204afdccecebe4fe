//! dirfts CLI - Local full-text search over a directory tree
//!
//! Every command runs against the nearest index at or above the current
//! directory, restricted to the current directory.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dirfts::{
    format_results, format_results_json, locate, stats, Config, DirftsError, ExclusionRule,
    IndexScope, IndexWatcher, Indexer, RuleKind, SearchMode, SearchResult, Searcher,
    SnippetStyle, Store,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dirfts")]
#[command(author, version, about = "Local full-text search over a directory tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Search term (when no subcommand is provided)
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,

    /// Color output
    #[arg(long, value_enum, default_value = "auto", env = "DIRFTS_COLOR", global = true)]
    color: ColorChoice,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an index in the current directory
    Init {
        /// Skip the initial sync
        #[arg(long)]
        no_sync: bool,

        /// Compress stored bodies (disables regex search)
        #[arg(long)]
        compressed: bool,
    },

    /// Bring the index up to date with the filesystem
    Sync {
        /// Only sync these files; nothing is deleted
        files: Vec<PathBuf>,
    },

    /// Manage exclusion rules
    Ignore {
        #[command(subcommand)]
        action: IgnoreAction,
    },

    /// Search the index
    Search {
        /// Search term, or a regex with --regex
        query: String,

        #[command(flatten)]
        options: SearchOptions,
    },

    /// Merge index segments and compact the store
    Optimize,

    /// Watch for file changes and sync automatically
    Watch,

    /// Show index statistics
    Stats,

    /// Show or change index configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Set a configuration value (max_file_size)
    Set {
        /// Config key
        key: String,

        /// New value
        value: String,
    },
}

#[derive(Subcommand, Debug)]
enum IgnoreAction {
    /// List exclusion rules
    List,

    /// Add an exclusion rule
    Add {
        /// Rule kind: literal, glob, or regex
        kind: String,

        /// Pattern to exclude
        pattern: String,
    },

    /// Remove an exclusion rule by id
    Rm {
        /// Rule id, as shown by `dirfts ignore list`
        id: i64,
    },
}

#[derive(clap::Args, Debug, Default)]
struct SearchOptions {
    /// Treat the query as a regex over whole file bodies (slow)
    #[arg(short = 'r', long, env = "DIRFTS_REGEX")]
    regex: bool,

    /// Skip comparing hits against the files on disk
    #[arg(long, env = "DIRFTS_NO_STALE_CHECK")]
    no_stale_check: bool,

    /// Show a snippet for each hit
    #[arg(short = 's', long, env = "DIRFTS_SNIPPETS")]
    snippets: bool,

    /// Output as JSON
    #[arg(long, env = "DIRFTS_JSON")]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn enabled(self) -> bool {
        match self {
            Self::Auto => std::io::stdout().is_terminal(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color = cli.color.enabled();
    colored::control::set_override(color);

    let success = match cli.command {
        Some(Commands::Init {
            no_sync,
            compressed,
        }) => cmd_init(no_sync, compressed)?,
        Some(Commands::Sync { files }) => cmd_sync(files)?,
        Some(Commands::Ignore { action }) => cmd_ignore(action)?,
        Some(Commands::Search { query, options }) => cmd_search(query, options, color)?,
        Some(Commands::Optimize) => cmd_optimize()?,
        Some(Commands::Watch) => cmd_watch()?,
        Some(Commands::Stats) => cmd_stats()?,
        Some(Commands::Config { action }) => cmd_config(action)?,
        None => {
            // Default: search if query provided, otherwise show help
            if cli.query.is_empty() {
                println!("{}", "dirfts - Local full-text search".cyan().bold());
                println!("\nUsage:");
                println!("  {} init                    # index this directory", "dirfts".green());
                println!("  {} \"term\"                  # search", "dirfts".green());
                println!("  {} sync                    # pick up changes", "dirfts".green());
                println!("\nRun {} for more options.", "dirfts --help".yellow());
                return Ok(());
            }

            cmd_search(cli.query.join(" "), SearchOptions::default(), color)?
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Locate the index governing the current directory, or exit with a hint
fn open_index() -> Result<(IndexScope, Store)> {
    let cwd = std::env::current_dir()?;
    match locate(&cwd) {
        Ok(found) => Ok(found),
        Err(DirftsError::NotFound) => {
            eprintln!(
                "{} No index found. Run {} first.",
                "Error:".red().bold(),
                "dirfts init".yellow()
            );
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_init(no_sync: bool, compressed: bool) -> Result<bool> {
    let cwd = std::env::current_dir()?;
    let mut store = Store::init(&cwd, compressed)?;
    println!("{} {}", "Created".cyan().bold(), store.path().display());

    if !no_sync {
        let scope = IndexScope::new(cwd.clone(), "");
        let config = Config::load(cwd, &store)?;
        let stats = Indexer::new(config)
            .with_progress(true)
            .sync(&mut store, &scope)?;
        println!("{} {}", "✓".green(), stats);
    }

    Ok(true)
}

fn cmd_sync(files: Vec<PathBuf>) -> Result<bool> {
    let (scope, mut store) = open_index()?;
    let config = Config::load(scope.root.clone(), &store)?;
    let indexer = Indexer::new(config).with_progress(true);

    let stats = if files.is_empty() {
        indexer.sync(&mut store, &scope)?
    } else {
        indexer.sync_files(&mut store, &scope, &files)?
    };

    println!("{} {}", "✓".green(), stats);
    Ok(true)
}

fn cmd_ignore(action: IgnoreAction) -> Result<bool> {
    let (_scope, store) = open_index()?;

    match action {
        IgnoreAction::List => {
            for (id, rule) in store.list_rules()? {
                println!("{}\t{}", id, rule);
            }
        }
        IgnoreAction::Add { kind, pattern } => {
            let kind: RuleKind = kind.parse()?;
            let id = store.add_rule(&ExclusionRule::new(kind, pattern))?;
            println!("{} rule {}", "Added".green(), id);
        }
        IgnoreAction::Rm { id } => {
            store.remove_rule(id)?;
            println!("{} rule {}", "Removed".green(), id);
        }
    }

    Ok(true)
}

fn cmd_search(query: String, options: SearchOptions, color: bool) -> Result<bool> {
    let (scope, mut store) = open_index()?;

    let mode = if options.regex {
        SearchMode::Regex
    } else {
        SearchMode::Term
    };
    let style = if color {
        SnippetStyle::ansi()
    } else {
        SnippetStyle::plain()
    };

    let searcher = Searcher::new(mode, style).with_staleness_check(!options.no_stale_check);

    if options.json {
        let results: Vec<SearchResult> = searcher.search(&mut store, &scope, &query)?.collect();
        println!("{}", format_results_json(&results)?);
        return Ok(!results.is_empty());
    }

    let mut found = false;
    for result in searcher.search(&mut store, &scope, &query)? {
        print!("{}", format_results(&[result], options.snippets));
        found = true;
    }

    Ok(found)
}

fn cmd_optimize() -> Result<bool> {
    let (_scope, mut store) = open_index()?;
    store.optimize()?;
    println!("{} {}", "✓".green(), "Optimized");
    Ok(true)
}

fn cmd_watch() -> Result<bool> {
    let (scope, store) = open_index()?;
    let config = Config::load(scope.root.clone(), &store)?;
    println!("{} {:?}", "Watching".cyan().bold(), scope.scope_dir());

    let mut watcher = IndexWatcher::new(scope, store, Indexer::new(config));
    watcher.watch()?;

    Ok(true)
}

fn cmd_stats() -> Result<bool> {
    let (scope, store) = open_index()?;
    let stats = stats(&store, &scope)?;

    println!("{}", "Index Statistics".cyan().bold());
    println!("  Root:       {}", scope.root.display().to_string().green());
    println!("  Documents:  {}", stats.documents.to_string().green());
    println!("  Rules:      {}", stats.rules.to_string().green());
    println!("  Compressed: {}", stats.compressed.to_string().yellow());

    Ok(true)
}

fn cmd_config(action: Option<ConfigAction>) -> Result<bool> {
    let (scope, store) = open_index()?;
    let mut config = Config::load(scope.root, &store)?;

    if let Some(ConfigAction::Set { key, value }) = action {
        config.set(&key, &value)?;
        config.save(&store)?;
        println!("{} {} = {}", "Set".green(), key, value.trim());
        return Ok(true);
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(true)
}
