//! Splits an ordered unit collection into shards by verbatim copy
//!
//! Each unit's payload is copied into the current shard unchanged. A
//! `LimitTracker` decides when the current shard is full; the unit that
//! overflows it opens the next shard and is re-counted there.
//!
//! # Main list
//!
//! `run` supports a two-pass protocol for units that must land in the first
//! shard. Pass one writes only the listed units and fails if they needed
//! more than one shard. With `minimal_main` the first shard is then closed
//! regardless of how full it is. Pass two writes everything else, continuing
//! the shard numbering.

use std::collections::BTreeSet;

use crate::error::{Result, ShardError};
use crate::limit::LimitTracker;
use crate::shard::{shard_name, ShardSummary};
use crate::sink::SplitSink;
use crate::source::UnitCatalog;
use crate::unit::CompiledUnit;

/// Splitter options
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub max_index: usize,
    /// When false, any rotation is a configuration error
    pub multidex: bool,
    /// Output naming prefix (`classes`)
    pub prefix: String,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            max_index: crate::config::DEFAULT_MAX_INDEX,
            multidex: true,
            prefix: crate::config::DEFAULT_PREFIX.to_string(),
        }
    }
}

/// Assigns units to shards and copies their bytes into a `SplitSink`
pub struct ShardSplitter<S: SplitSink> {
    sink: S,
    options: SplitOptions,
    tracker: LimitTracker,
    shard_index: usize,
    shard_units: usize,
    shard_open: bool,
    closed: Vec<ShardSummary>,
}

impl<S: SplitSink> ShardSplitter<S> {
    pub fn new(sink: S, options: SplitOptions) -> Self {
        let tracker = LimitTracker::new(options.max_index);
        Self {
            sink,
            options,
            tracker,
            shard_index: 0,
            shard_units: 0,
            shard_open: false,
            closed: Vec::new(),
        }
    }

    /// Two-pass split of the whole catalog honoring an optional main list
    pub fn run(
        &mut self,
        catalog: &UnitCatalog,
        main_list: Option<&BTreeSet<String>>,
        minimal_main: bool,
    ) -> Result<()> {
        let Some(main_list) = main_list else {
            if minimal_main {
                return Err(ShardError::configuration(
                    "minimal main shard requested without a main list",
                ));
            }
            return self.process(catalog, |_| true);
        };

        let missing = main_list.iter().filter(|n| !catalog.contains(n.as_str())).count();
        if missing > 0 {
            tracing::warn!(missing, "main list names not found in any input");
        }

        self.process(catalog, |name| main_list.contains(name))?;
        if self.shards_written() > 0 {
            return Err(ShardError::configuration(format!(
                "main list ({} entries) does not fit in a single shard of {} indices",
                main_list.len(),
                self.options.max_index
            )));
        }

        if minimal_main {
            self.next_shard()?;
        }

        self.process(catalog, |name| !main_list.contains(name))
    }

    /// Write every catalog unit whose name satisfies `predicate`, in name order
    pub fn process<F>(&mut self, catalog: &UnitCatalog, predicate: F) -> Result<()>
    where
        F: Fn(&str) -> bool,
    {
        for name in catalog.names().filter(|n| predicate(n)) {
            let unit = catalog.read(name)?.into_unit()?;
            self.add(&unit)?;
        }
        Ok(())
    }

    /// Place one unit, rotating first if it overflows a non-empty shard
    pub fn add(&mut self, unit: &CompiledUnit) -> Result<()> {
        let before = (self.tracker.field_count(), self.tracker.method_count());
        if self.tracker.track(unit) && self.shard_units > 0 {
            if !self.options.multidex {
                return Err(ShardError::configuration(format!(
                    "{} does not fit in a single shard and multidex is disabled",
                    unit.name()
                )));
            }
            self.close_shard(before.0, before.1)?;
            self.tracker.track(unit);
        }

        if !self.shard_open {
            let name = shard_name(&self.options.prefix, self.shard_index);
            self.sink.begin_shard(self.shard_index, &name)?;
            self.shard_open = true;
        }
        self.sink.write_entry(unit.name(), unit.payload())?;
        self.shard_units += 1;
        Ok(())
    }

    /// Close the current shard (even if it is under capacity or empty) and
    /// start the next one
    pub fn next_shard(&mut self) -> Result<()> {
        if !self.options.multidex {
            return Err(ShardError::configuration(
                "cannot start another shard with multidex disabled",
            ));
        }
        if !self.shard_open {
            let name = shard_name(&self.options.prefix, self.shard_index);
            self.sink.begin_shard(self.shard_index, &name)?;
            self.shard_open = true;
        }
        let (fields, methods) = (self.tracker.field_count(), self.tracker.method_count());
        self.close_shard(fields, methods)
    }

    fn close_shard(&mut self, fields: usize, methods: usize) -> Result<()> {
        if self.shard_open {
            self.sink.finish_shard()?;
            self.shard_open = false;
        }
        let summary = ShardSummary {
            index: self.shard_index,
            units: self.shard_units,
            fields,
            methods,
        };
        tracing::debug!(
            shard = summary.index,
            units = summary.units,
            fields,
            methods,
            "rotating shard"
        );
        self.closed.push(summary);
        self.shard_index += 1;
        self.shard_units = 0;
        self.tracker.reset();
        Ok(())
    }

    /// Number of shards closed so far
    pub fn shards_written(&self) -> usize {
        self.shard_index
    }

    pub fn summaries(&self) -> &[ShardSummary] {
        &self.closed
    }

    /// Finish the last shard if it holds anything and close the sink.
    /// Consumes the splitter, so no shard can be opened afterwards.
    pub fn close(mut self) -> Result<Vec<ShardSummary>> {
        if self.shard_units > 0 {
            let (fields, methods) = (self.tracker.field_count(), self.tracker.method_count());
            self.close_shard(fields, methods)?;
        }
        self.sink.close()?;
        tracing::info!(shards = self.closed.len(), "split complete");
        Ok(self.closed)
    }
}
