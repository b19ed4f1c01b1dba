//! Compiled units: one payload per source class plus the symbols it references

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::symbol::{FieldSymbol, MethodSymbol};

/// An immutable compiled unit.
///
/// The payload is shared behind an `Arc` so handing a unit to a background
/// merge task never copies bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    name: String,
    payload: Arc<[u8]>,
    fields: BTreeSet<FieldSymbol>,
    methods: BTreeSet<MethodSymbol>,
}

impl CompiledUnit {
    pub fn new(
        name: impl Into<String>,
        payload: impl Into<Arc<[u8]>>,
        fields: impl IntoIterator<Item = FieldSymbol>,
        methods: impl IntoIterator<Item = MethodSymbol>,
    ) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            fields: fields.into_iter().collect(),
            methods: methods.into_iter().collect(),
        }
    }

    /// Stable identity and sort key (e.g. `com/example/Foo.class.dex`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Shared handle to the payload bytes
    pub fn payload_arc(&self) -> Arc<[u8]> {
        Arc::clone(&self.payload)
    }

    pub fn fields(&self) -> &BTreeSet<FieldSymbol> {
        &self.fields
    }

    pub fn methods(&self) -> &BTreeSet<MethodSymbol> {
        &self.methods
    }
}
