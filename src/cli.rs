//! CLI argument definitions using clap with subcommand architecture

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::ShardingConfig;
use crate::error::{Result, ShardError};

/// Shard compiled units into index-limited containers
#[derive(Parser, Debug)]
#[command(name = "dexshard")]
#[command(about = "Split or merge compiled units into containers with a bounded symbol index")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format for the run report
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy units verbatim into as few shards as the index limit allows
    Split(SplitArgs),

    /// Merge units into one payload per shard
    Merge(MergeArgs),
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

// ============================================
// Shared arguments
// ============================================

/// Inputs, output and limits common to both commands
#[derive(Args, Debug, Clone)]
pub struct ShardArgs {
    /// Unit manifest (JSON). Repeatable; earlier manifests win on duplicate names
    #[arg(long = "manifest", value_name = "FILE", required = true)]
    pub manifests: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub out: PathBuf,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum distinct fields or methods per shard
    #[arg(long, value_name = "N")]
    pub max_index: Option<usize>,

    /// File listing units that must land in the first shard
    #[arg(long, value_name = "FILE")]
    pub main_list: Option<PathBuf>,

    /// Keep units not on the main list out of the first shard
    #[arg(long)]
    pub minimal_main: bool,

    /// Produce exactly one shard; overflowing it is an error
    #[arg(long)]
    pub single: bool,
}

impl ShardArgs {
    /// Config file values with command-line overrides applied, validated
    pub fn resolve_config(&self) -> Result<ShardingConfig> {
        let mut config = match &self.config {
            Some(path) if !path.exists() => {
                return Err(ShardError::configuration(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            Some(path) => ShardingConfig::load_from(path)?,
            None => ShardingConfig::default(),
        };

        if let Some(max) = self.max_index {
            config.max_index_per_shard = max;
        }
        if let Some(list) = &self.main_list {
            config.main_list = Some(list.clone());
        }
        if self.minimal_main {
            config.minimal_main_shard = true;
        }
        if self.single {
            config.multidex = false;
        }

        config.validate()?;
        Ok(config)
    }
}

// ============================================
// Split Subcommand
// ============================================

/// Arguments for the split command
#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    #[command(flatten)]
    pub shard: ShardArgs,
}

// ============================================
// Merge Subcommand
// ============================================

/// Arguments for the merge command
#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[command(flatten)]
    pub shard: ShardArgs,

    /// Merge worker threads (0 = one per core)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Largest number of inputs the codec accepts in one merge call
    #[arg(long, value_name = "N")]
    pub max_batch: Option<usize>,

    /// Index of the first shard written
    #[arg(long, value_name = "N")]
    pub first_index: Option<usize>,
}

impl MergeArgs {
    pub fn resolve_config(&self) -> Result<ShardingConfig> {
        let mut config = self.shard.resolve_config()?;
        if let Some(threads) = self.threads {
            config.worker_threads = threads;
        }
        if let Some(first) = self.first_index {
            config.first_shard_index = first;
        }
        Ok(config)
    }
}
