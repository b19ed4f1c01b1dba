//! Output destinations for closed shards
//!
//! Two shapes of destination exist. The splitter copies unit entries
//! verbatim into a per-shard container (`SplitSink`). The aggregator hands
//! one merged payload per shard to a `ShardSink`.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, ShardError};
use crate::shard::shard_name;

/// Destination for merged shard payloads.
///
/// Not required to handle concurrent writes; callers serialize them.
pub trait ShardSink: Send {
    fn write(&mut self, index: usize, bytes: &[u8]) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Destination for splitter shards, one container per shard
pub trait SplitSink {
    fn begin_shard(&mut self, index: usize, name: &str) -> Result<()>;

    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    fn finish_shard(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

// ============================================
// Directory-backed sinks
// ============================================

/// Writes shard `i` to `<dir>/<shard_name>.<extension>`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, extension: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}.{}", shard_name(&self.prefix, index), self.extension))
    }
}

impl ShardSink for DirectorySink {
    fn write(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(index);
        fs::write(&path, bytes)?;
        tracing::info!(shard = index, bytes = bytes.len(), path = %path.display(), "wrote shard");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes splitter shard `name` as the directory `<dir>/<name>/`, with one
/// file per entry at the entry's relative path
#[derive(Debug)]
pub struct DirectorySplitSink {
    dir: PathBuf,
    current: Option<PathBuf>,
}

impl DirectorySplitSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, current: None })
    }
}

fn check_entry_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(ShardError::corrupt(name, "entry name is not a relative path"));
    }
    Ok(())
}

impl SplitSink for DirectorySplitSink {
    fn begin_shard(&mut self, index: usize, name: &str) -> Result<()> {
        let shard_dir = self.dir.join(name);
        fs::create_dir_all(&shard_dir)?;
        tracing::debug!(shard = index, path = %shard_dir.display(), "opened shard");
        self.current = Some(shard_dir);
        Ok(())
    }

    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        check_entry_name(name)?;
        let shard_dir = self
            .current
            .as_ref()
            .ok_or_else(|| ShardError::configuration("entry written with no open shard"))?;
        let path = shard_dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn finish_shard(&mut self) -> Result<()> {
        if let Some(dir) = self.current.take() {
            tracing::info!(path = %dir.display(), "closed shard");
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.finish_shard()
    }
}

// ============================================
// In-memory sinks
// ============================================

/// Collects merged shards in memory. Clones share the same storage, so a
/// handle kept by the caller can inspect what the aggregator wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkState>>,
}

#[derive(Debug, Default)]
struct MemorySinkState {
    writes: Vec<(usize, Vec<u8>)>,
    close_count: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(index, bytes)` in the order they were written
    pub fn writes(&self) -> Vec<(usize, Vec<u8>)> {
        self.inner.lock().writes.clone()
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().close_count
    }
}

impl ShardSink for MemorySink {
    fn write(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        self.inner.lock().writes.push((index, bytes.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.lock().close_count += 1;
        Ok(())
    }
}

/// One splitter shard captured in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitShard {
    pub index: usize,
    pub name: String,
    pub entries: Vec<(String, Vec<u8>)>,
}

impl SplitShard {
    pub fn entry_names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Collects splitter shards in memory; clones share storage
#[derive(Debug, Clone, Default)]
pub struct MemorySplitSink {
    shards: Arc<Mutex<Vec<SplitShard>>>,
    open: bool,
}

impl MemorySplitSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shards(&self) -> Vec<SplitShard> {
        self.shards.lock().clone()
    }
}

impl SplitSink for MemorySplitSink {
    fn begin_shard(&mut self, index: usize, name: &str) -> Result<()> {
        self.shards.lock().push(SplitShard {
            index,
            name: name.to_string(),
            entries: Vec::new(),
        });
        self.open = true;
        Ok(())
    }

    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(ShardError::configuration("entry written with no open shard"));
        }
        let mut shards = self.shards.lock();
        if let Some(shard) = shards.last_mut() {
            shard.entries.push((name.to_string(), bytes.to_vec()));
        }
        Ok(())
    }

    fn finish_shard(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.finish_shard()
    }
}
