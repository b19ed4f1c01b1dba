//! Unit sources: where compiled units come from
//!
//! A source lists unit names up front and reads an entry only on demand, so
//! the catalog can resolve duplicates without touching the bytes of entries
//! that lose.
//!
//! # Manifest format
//!
//! ```json
//! {
//!   "units": [
//!     {
//!       "name": "com/example/Foo.class.dex",
//!       "path": "Foo.dex",
//!       "size": 112,
//!       "fields": [{"owner": "Lcom/example/Foo;", "name": "x", "type": "I"}],
//!       "methods": [{"owner": "Lcom/example/Foo;", "name": "run", "params": [], "return": "V"}]
//!     }
//!   ]
//! }
//! ```
//!
//! `path` is relative to the manifest's directory. `size` is optional; when
//! present it must match the number of bytes read. `stored: false` marks a
//! compressed entry, which verification rejects.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, ShardError};
use crate::symbol::{FieldSymbol, MethodSymbol};
use crate::unit::CompiledUnit;

/// How an entry's bytes are held in its backing container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    /// Uncompressed, copied byte-for-byte
    #[default]
    Stored,
    /// Compressed; cannot be copied verbatim into a shard
    Compressed,
}

/// A raw entry as read from a source, before verification
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub name: String,
    /// Size recorded by the container, if it records one
    pub declared_size: Option<u64>,
    pub storage: Storage,
    pub payload: Vec<u8>,
    pub fields: Vec<FieldSymbol>,
    pub methods: Vec<MethodSymbol>,
}

impl SourceEntry {
    /// Stored entry whose declared size matches its payload
    pub fn stored(
        name: impl Into<String>,
        payload: Vec<u8>,
        fields: Vec<FieldSymbol>,
        methods: Vec<MethodSymbol>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_size: Some(payload.len() as u64),
            storage: Storage::Stored,
            payload,
            fields,
            methods,
        }
    }

    /// Check the storage convention and declared size, then freeze into a unit
    pub fn into_unit(self) -> Result<CompiledUnit> {
        if self.storage != Storage::Stored {
            return Err(ShardError::corrupt(
                self.name,
                "entry is compressed; expected a stored entry",
            ));
        }
        if let Some(declared) = self.declared_size {
            let actual = self.payload.len() as u64;
            if declared != actual {
                return Err(ShardError::corrupt(
                    self.name,
                    format!("declared {} bytes but read {}", declared, actual),
                ));
            }
        }
        Ok(CompiledUnit::new(
            self.name,
            self.payload,
            self.fields,
            self.methods,
        ))
    }
}

/// A backing collection of compiled units (an archive, a manifest, memory)
pub trait UnitSource: Send + Sync {
    /// Unit names in source order. May contain duplicates.
    fn names(&self) -> Vec<String>;

    /// Read the first entry with the given name
    fn read(&self, name: &str) -> Result<SourceEntry>;

    /// Human-readable origin, used in log messages
    fn describe(&self) -> String;
}

// ============================================
// In-memory source
// ============================================

/// Source backed by entries held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    label: String,
    entries: Vec<SourceEntry>,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, entries: Vec<SourceEntry>) -> Self {
        Self {
            label: label.into(),
            entries,
        }
    }

    pub fn from_units(label: impl Into<String>, units: &[CompiledUnit]) -> Self {
        let entries = units
            .iter()
            .map(|u| {
                SourceEntry::stored(
                    u.name(),
                    u.payload().to_vec(),
                    u.fields().iter().cloned().collect(),
                    u.methods().iter().cloned().collect(),
                )
            })
            .collect();
        Self::new(label, entries)
    }
}

impl UnitSource for MemorySource {
    fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    fn read(&self, name: &str) -> Result<SourceEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| ShardError::corrupt(name, format!("not found in {}", self.label)))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

// ============================================
// Manifest-backed source
// ============================================

#[derive(Debug, Deserialize)]
struct ManifestFile {
    units: Vec<ManifestUnit>,
}

#[derive(Debug, Deserialize)]
struct ManifestUnit {
    name: String,
    path: PathBuf,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default = "default_stored")]
    stored: bool,
    #[serde(default)]
    fields: Vec<FieldSymbol>,
    #[serde(default)]
    methods: Vec<MethodSymbol>,
}

fn default_stored() -> bool {
    true
}

/// Source described by a JSON manifest; payloads live in files next to it
#[derive(Debug)]
pub struct ManifestSource {
    manifest: PathBuf,
    base_dir: PathBuf,
    units: Vec<ManifestUnit>,
    by_name: HashMap<String, usize>,
}

impl ManifestSource {
    /// Parse a manifest. Payload files are not opened until `read`.
    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let file: ManifestFile =
            serde_json::from_str(&content).map_err(|e| ShardError::Manifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut by_name = HashMap::new();
        for (i, unit) in file.units.iter().enumerate() {
            by_name.entry(unit.name.clone()).or_insert(i);
        }

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        tracing::debug!(
            manifest = %path.display(),
            units = file.units.len(),
            "opened manifest"
        );

        Ok(Self {
            manifest: path.to_path_buf(),
            base_dir,
            units: file.units,
            by_name,
        })
    }
}

impl UnitSource for ManifestSource {
    fn names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name.clone()).collect()
    }

    fn read(&self, name: &str) -> Result<SourceEntry> {
        let unit = self
            .by_name
            .get(name)
            .map(|&i| &self.units[i])
            .ok_or_else(|| ShardError::Manifest {
                path: self.manifest.clone(),
                message: format!("no unit named {}", name),
            })?;

        let payload = fs::read(self.base_dir.join(&unit.path))?;
        Ok(SourceEntry {
            name: unit.name.clone(),
            declared_size: unit.size,
            storage: if unit.stored {
                Storage::Stored
            } else {
                Storage::Compressed
            },
            payload,
            fields: unit.fields.clone(),
            methods: unit.methods.clone(),
        })
    }

    fn describe(&self) -> String {
        self.manifest.display().to_string()
    }
}

// ============================================
// Catalog
// ============================================

/// Deduplicated, name-ordered view over several sources.
///
/// When a name appears in more than one source the first source wins and
/// the later entries are never read.
pub struct UnitCatalog {
    sources: Vec<Box<dyn UnitSource>>,
    owners: BTreeMap<String, usize>,
}

impl UnitCatalog {
    pub fn new(sources: Vec<Box<dyn UnitSource>>) -> Self {
        let mut owners = BTreeMap::new();
        let mut shadowed = 0usize;
        for (i, source) in sources.iter().enumerate() {
            for name in source.names() {
                match owners.entry(name) {
                    std::collections::btree_map::Entry::Vacant(slot) => {
                        slot.insert(i);
                    }
                    std::collections::btree_map::Entry::Occupied(_) => shadowed += 1,
                }
            }
        }
        if shadowed > 0 {
            tracing::debug!(shadowed, "ignoring duplicate unit names in later sources");
        }
        Self { sources, owners }
    }

    /// Open every manifest, in order, as one catalog
    pub fn from_manifests(paths: &[PathBuf]) -> Result<Self> {
        let mut sources: Vec<Box<dyn UnitSource>> = Vec::with_capacity(paths.len());
        for path in paths {
            sources.push(Box::new(ManifestSource::open(path)?));
        }
        Ok(Self::new(sources))
    }

    /// Unique names in lexicographic order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.owners.contains_key(name)
    }

    /// Read the winning entry for `name`
    pub fn read(&self, name: &str) -> Result<SourceEntry> {
        let source = self
            .owners
            .get(name)
            .map(|&i| &self.sources[i])
            .ok_or_else(|| ShardError::corrupt(name, "not present in any source"))?;
        source.read(name)
    }

    /// Read and verify every unit in name order
    pub fn units(&self) -> impl Iterator<Item = Result<CompiledUnit>> + '_ {
        self.names().map(|name| self.read(name)?.into_unit())
    }
}
