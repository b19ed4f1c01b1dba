//! Sharding configuration.
//!
//! Loaded from a TOML file; every key is optional:
//!
//! ```toml
//! max_index_per_shard = 65536
//! multidex = true
//! main_list = "main-list.txt"
//! minimal_main_shard = false
//! worker_threads = 0
//! first_shard_index = 0
//! output_prefix = "classes"
//! output_extension = "dex"
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardError};

/// Index table ceiling of the output container format
pub const DEFAULT_MAX_INDEX: usize = 65536;

pub const DEFAULT_PREFIX: &str = "classes";

pub const DEFAULT_EXTENSION: &str = "dex";

/// Configuration shared by the split and merge pipelines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShardingConfig {
    /// Maximum distinct fields, and separately methods, per shard
    pub max_index_per_shard: usize,

    /// Allow more than one output shard
    pub multidex: bool,

    /// Newline-separated list of unit names that must land in the first shard
    pub main_list: Option<PathBuf>,

    /// Keep everything not on the main list out of the first shard
    pub minimal_main_shard: bool,

    /// Merge worker threads (0 = one per core)
    pub worker_threads: usize,

    /// Index of the first shard the aggregator writes
    pub first_shard_index: usize,

    pub output_prefix: String,

    pub output_extension: String,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            max_index_per_shard: DEFAULT_MAX_INDEX,
            multidex: true,
            main_list: None,
            minimal_main_shard: false,
            worker_threads: 0,
            first_shard_index: 0,
            output_prefix: DEFAULT_PREFIX.to_string(),
            output_extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl ShardingConfig {
    /// Load configuration from a specific path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ShardError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // Relative main list paths are relative to the config file
        if let (Some(list), Some(dir)) = (config.main_list.as_mut(), path.parent()) {
            if list.is_relative() {
                *list = dir.join(&*list);
            }
        }
        Ok(config)
    }

    /// Reject settings that cannot produce a valid run
    pub fn validate(&self) -> Result<()> {
        if self.max_index_per_shard == 0 {
            return Err(ShardError::configuration(
                "max_index_per_shard must be greater than 0",
            ));
        }
        if self.minimal_main_shard && self.main_list.is_none() {
            return Err(ShardError::configuration(
                "minimal_main_shard requires a main_list",
            ));
        }
        if self.minimal_main_shard && !self.multidex {
            return Err(ShardError::configuration(
                "minimal_main_shard needs a second shard but multidex is disabled",
            ));
        }
        if self.output_prefix.is_empty() {
            return Err(ShardError::configuration("output_prefix must not be empty"));
        }
        Ok(())
    }

    /// Read the configured main list, if any
    pub fn load_main_list(&self) -> Result<Option<BTreeSet<String>>> {
        self.main_list
            .as_deref()
            .map(read_main_list)
            .transpose()
    }
}

/// Parse a main list file: one unit name per line, `#` starts a comment
pub fn read_main_list(path: &Path) -> Result<BTreeSet<String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_main_list(&content))
}

pub fn parse_main_list(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
