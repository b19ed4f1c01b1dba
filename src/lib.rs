//! dexshard: pack compiled units into index-limited containers
//!
//! Each compiled unit carries the set of field and method descriptors it
//! references. An output container can index only so many distinct
//! descriptors, so a large collection of units has to be spread over several
//! containers ("shards"). This crate assigns units to shards greedily, in a
//! deterministic name order, without letting any closed shard exceed the
//! limit.
//!
//! Two pipelines share the same accounting:
//!
//! - [`ShardSplitter`] copies each unit's bytes verbatim into its shard and
//!   supports a main list of units that must land in the first shard.
//! - [`ShardAggregator`] merges each full shard into a single payload on a
//!   worker pool and writes the results in shard order.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dexshard::{AggregateOptions, CompiledUnit, FramedCodec, MemorySink, ShardAggregator};
//!
//! let sink = MemorySink::new();
//! let mut agg = ShardAggregator::new(
//!     AggregateOptions { max_index: 2, ..Default::default() },
//!     Arc::new(FramedCodec::new()),
//!     Box::new(sink.clone()),
//! )?;
//! for unit in units {
//!     agg.add(unit)?;
//! }
//! let shards = agg.close()?;
//! ```

pub mod aggregator;
pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod error;
pub mod limit;
pub mod shard;
pub mod sink;
pub mod source;
pub mod splitter;
pub mod symbol;
pub mod unit;

// Re-export commonly used types
pub use aggregator::{merge_units, AggregateOptions, ShardAggregator};
pub use codec::{FramedCodec, MergeCodec, MergeError};
pub use config::ShardingConfig;
pub use error::{Result, ShardError};
pub use limit::LimitTracker;
pub use shard::{shard_name, ShardStats, ShardSummary};
pub use sink::{
    DirectorySink, DirectorySplitSink, MemorySink, MemorySplitSink, ShardSink, SplitShard,
    SplitSink,
};
pub use source::{ManifestSource, MemorySource, SourceEntry, Storage, UnitCatalog, UnitSource};
pub use splitter::{ShardSplitter, SplitOptions};
pub use symbol::{FieldSymbol, MethodSymbol};
pub use unit::CompiledUnit;
