//! Per-shard index accounting
//!
//! Counts distinct field and method descriptors, not occurrences: the output
//! container's ceiling applies to index-table entries.

use ahash::AHashSet;

use crate::symbol::{FieldSymbol, MethodSymbol};
use crate::unit::CompiledUnit;

/// Running symbol universe for the shard currently being filled
#[derive(Debug, Clone)]
pub struct LimitTracker {
    max_index: usize,
    fields: AHashSet<FieldSymbol>,
    methods: AHashSet<MethodSymbol>,
}

impl LimitTracker {
    pub fn new(max_index: usize) -> Self {
        Self {
            max_index,
            fields: AHashSet::new(),
            methods: AHashSet::new(),
        }
    }

    /// Merge `unit`'s symbols into the running sets.
    ///
    /// The sets are updated unconditionally. Returns `true` when either set
    /// now holds more than `max_index` entries.
    pub fn track(&mut self, unit: &CompiledUnit) -> bool {
        self.fields.extend(unit.fields().iter().cloned());
        self.methods.extend(unit.methods().iter().cloned());
        let over = self.is_over_limit();
        tracing::trace!(
            unit = unit.name(),
            fields = self.fields.len(),
            methods = self.methods.len(),
            over,
            "tracked unit"
        );
        over
    }

    pub fn is_over_limit(&self) -> bool {
        self.fields.len() > self.max_index || self.methods.len() > self.max_index
    }

    /// Forget everything, ready for a new shard
    pub fn reset(&mut self) {
        self.fields.clear();
        self.methods.clear();
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn max_index(&self) -> usize {
        self.max_index
    }
}
