//! Command modules for the dexshard CLI
//!
//! Each command module implements a single top-level command:
//! - `split` - Copy units verbatim into index-limited shards
//! - `merge` - Merge units into one payload per shard
//!
//! Both handlers take their `Args` struct from `cli.rs` and a shared
//! `CommandContext` for output format and verbosity.

pub mod merge;
pub mod split;

pub use merge::run_merge;
pub use split::run_split;

use crate::cli::OutputFormat;
use crate::error::{Result, ShardError};
use crate::shard::ShardStats;

/// Shared context passed to all command handlers
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Output format (text or json)
    pub format: OutputFormat,
    /// Show verbose output
    pub verbose: bool,
}

impl Default for CommandContext {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            verbose: false,
        }
    }
}

impl CommandContext {
    pub fn from_cli(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }
}

/// Render a run report in the requested format
pub fn render_stats(kind: &str, stats: &ShardStats, prefix: &str, ctx: &CommandContext) -> Result<String> {
    match ctx.format {
        OutputFormat::Text => {
            let mut output = format!("_type: {}\n", kind);
            output.push_str(&stats.to_text(prefix));
            Ok(output)
        }
        OutputFormat::Json => {
            let mut value = serde_json::to_value(stats).map_err(report_error)?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("_type".to_string(), serde_json::Value::from(kind));
            }
            let mut output = serde_json::to_string_pretty(&value).map_err(report_error)?;
            output.push('\n');
            Ok(output)
        }
    }
}

fn report_error(err: serde_json::Error) -> ShardError {
    ShardError::Report {
        message: format!("JSON serialization failed: {}", err),
    }
}
