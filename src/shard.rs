//! Shard naming and accounting shared by the splitter and the aggregator
//!
//! Shard names follow the container convention: shard 0 is `prefix`,
//! shard `i` is `prefix{i+1}` (`classes`, `classes2`, `classes3`, ...).

use serde::Serialize;

/// Name of shard `index` under `prefix`
pub fn shard_name(prefix: &str, index: usize) -> String {
    if index == 0 {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, index + 1)
    }
}

/// Accounting snapshot of one closed shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShardSummary {
    /// Shard index (0-based, plus any configured offset)
    pub index: usize,

    /// Units assigned to the shard
    pub units: usize,

    /// Distinct field descriptors referenced by those units
    pub fields: usize,

    /// Distinct method descriptors referenced by those units
    pub methods: usize,
}

/// Totals across every shard of a run
#[derive(Debug, Default, Clone, Serialize)]
pub struct ShardStats {
    /// Number of shards written
    pub shards_written: usize,

    /// Units across all shards
    pub units_written: usize,

    /// Largest field universe of any shard
    pub max_fields: usize,

    /// Largest method universe of any shard
    pub max_methods: usize,

    /// Per-shard detail
    pub shards: Vec<ShardSummary>,
}

impl ShardStats {
    pub fn from_summaries(shards: Vec<ShardSummary>) -> Self {
        Self {
            shards_written: shards.len(),
            units_written: shards.iter().map(|s| s.units).sum(),
            max_fields: shards.iter().map(|s| s.fields).max().unwrap_or(0),
            max_methods: shards.iter().map(|s| s.methods).max().unwrap_or(0),
            shards,
        }
    }

    /// Plain `key: value` report, one shard per line after the totals
    pub fn to_text(&self, prefix: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("shards_written: {}\n", self.shards_written));
        out.push_str(&format!("units_written: {}\n", self.units_written));
        out.push_str(&format!("max_fields: {}\n", self.max_fields));
        out.push_str(&format!("max_methods: {}\n", self.max_methods));
        for shard in &self.shards {
            out.push_str(&format!(
                "  {}: units={} fields={} methods={}\n",
                shard_name(prefix, shard.index),
                shard.units,
                shard.fields,
                shard.methods
            ));
        }
        out
    }
}
