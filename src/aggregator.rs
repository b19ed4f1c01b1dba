//! Aggregates a stream of units into merged shards
//!
//! Units accumulate in the current shard until one overflows the index
//! limit. The full shard is then handed to a worker pool to merge in the
//! background while the caller keeps adding units to a fresh shard.
//!
//! # Ordering
//!
//! Merges run concurrently and may finish in any order. Writes do not: a
//! single writer thread receives one pending result per shard in submission
//! order and waits on each before writing the next, so the sink always sees
//! ascending shard indices.
//!
//! # Accounting
//!
//! A unit's symbols are counted against the current shard before the
//! overflow check. When the check trips, the shard is closed without that
//! unit and the unit is counted again against the new shard. The tracker can
//! therefore hold one unit's worth of excess between detection and rotation,
//! never more.
//!
//! # Errors
//!
//! `add` and `flush` never block and do not report merge failures. Every
//! background failure surfaces from `close`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::codec::{MergeCodec, MergeError};
use crate::error::{Result, ShardError};
use crate::limit::LimitTracker;
use crate::shard::ShardSummary;
use crate::sink::ShardSink;
use crate::unit::CompiledUnit;

/// Aggregator options
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub max_index: usize,
    /// When false, a required rotation is a configuration error
    pub multidex: bool,
    /// Index assigned to the first shard
    pub first_index: usize,
    /// Merge worker threads (0 = rayon's default)
    pub worker_threads: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            max_index: crate::config::DEFAULT_MAX_INDEX,
            multidex: true,
            first_index: 0,
            worker_threads: 0,
        }
    }
}

type SharedSink = Arc<Mutex<Box<dyn ShardSink>>>;

/// A shard whose merge has been submitted but not yet written
struct PendingWrite {
    index: usize,
    result: Receiver<Result<Vec<u8>>>,
}

/// Accumulates units and merges full shards in the background
pub struct ShardAggregator {
    options: AggregateOptions,
    tracker: LimitTracker,
    pending: Vec<CompiledUnit>,
    next_index: usize,
    closed: Vec<ShardSummary>,
    codec: Arc<dyn MergeCodec>,
    pool: ThreadPool,
    sink: SharedSink,
    queue: Option<Sender<PendingWrite>>,
    writer: Option<JoinHandle<Result<()>>>,
}

impl ShardAggregator {
    pub fn new(
        options: AggregateOptions,
        codec: Arc<dyn MergeCodec>,
        sink: Box<dyn ShardSink>,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.worker_threads)
            .thread_name(|i| format!("dexshard-merge-{}", i))
            .build()
            .map_err(|e| ShardError::configuration(format!("cannot start merge pool: {}", e)))?;

        let sink: SharedSink = Arc::new(Mutex::new(sink));
        let (queue, rx) = mpsc::channel();
        let writer_sink = Arc::clone(&sink);
        let writer = thread::Builder::new()
            .name("dexshard-writer".to_string())
            .spawn(move || write_in_order(rx, writer_sink))?;

        Ok(Self {
            tracker: LimitTracker::new(options.max_index),
            next_index: options.first_index,
            options,
            pending: Vec::new(),
            closed: Vec::new(),
            codec,
            pool,
            sink,
            queue: Some(queue),
            writer: Some(writer),
        })
    }

    /// Add a unit to the current shard, rotating first if it overflows
    pub fn add(&mut self, unit: CompiledUnit) -> Result<()> {
        let before = (self.tracker.field_count(), self.tracker.method_count());
        if self.tracker.track(&unit) && !self.pending.is_empty() {
            if !self.options.multidex {
                return Err(ShardError::configuration(format!(
                    "{} does not fit in a single shard and multidex is disabled",
                    unit.name()
                )));
            }
            self.rotate(before.0, before.1);
            self.tracker.track(&unit);
        }
        self.pending.push(unit);
        Ok(())
    }

    /// Submit the current shard for merging if it holds anything.
    ///
    /// Later units start a new shard, so this fails when multidex is
    /// disabled and the current shard is not empty.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if !self.options.multidex {
            return Err(ShardError::configuration(
                "cannot start another shard with multidex disabled",
            ));
        }
        self.submit_pending();
        Ok(())
    }

    /// Index the next shard will receive
    pub fn shards_written(&self) -> usize {
        self.next_index
    }

    /// Shards submitted so far
    pub fn summaries(&self) -> &[ShardSummary] {
        &self.closed
    }

    fn submit_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let (fields, methods) = (self.tracker.field_count(), self.tracker.method_count());
        self.rotate(fields, methods);
    }

    fn rotate(&mut self, fields: usize, methods: usize) {
        let units = std::mem::take(&mut self.pending);
        let index = self.next_index;
        self.next_index += 1;
        self.tracker.reset();

        let summary = ShardSummary {
            index,
            units: units.len(),
            fields,
            methods,
        };
        tracing::debug!(shard = index, units = units.len(), fields, methods, "rotating shard");
        self.closed.push(summary);

        let (tx, rx) = mpsc::sync_channel(1);
        let codec = Arc::clone(&self.codec);
        self.pool.spawn(move || {
            let merged = panic::catch_unwind(AssertUnwindSafe(|| merge_units(&*codec, &units)))
                .unwrap_or_else(|_| {
                    Err(ShardError::Concurrency {
                        message: format!("merge of shard {} panicked", index),
                    })
                });
            // The writer may already have stopped after an earlier failure
            let _ = tx.send(merged);
        });

        let Some(queue) = self.queue.as_ref() else {
            return;
        };
        if queue.send(PendingWrite { index, result: rx }).is_err() {
            // The writer stopped on an earlier failure; close() reports it
            tracing::debug!(shard = index, "writer stopped, shard will not be written");
        }
    }

    /// Submit the last shard, wait for every write, then close the sink.
    ///
    /// The sink is closed exactly once, even when a merge or write failed.
    /// The first failure from any background task is returned. There is no
    /// timeout: this waits for all outstanding merges.
    pub fn close(mut self) -> Result<Vec<ShardSummary>> {
        self.submit_pending();

        // Dropping the sender lets the writer drain and exit
        self.queue = None;
        let written = match self.writer.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(ShardError::Concurrency {
                    message: "shard writer panicked".to_string(),
                })
            }),
            None => Ok(()),
        };

        let sink_closed = self.sink.lock().close();

        written?;
        sink_closed?;
        tracing::info!(shards = self.closed.len(), "merge complete");
        Ok(std::mem::take(&mut self.closed))
    }
}

/// Writer loop: one pending result per shard, consumed in submission order
fn write_in_order(queue: Receiver<PendingWrite>, sink: SharedSink) -> Result<()> {
    for pending in queue {
        let bytes = pending.result.recv().map_err(|_| ShardError::Concurrency {
            message: format!("merge of shard {} was dropped", pending.index),
        })??;
        sink.lock().write(pending.index, &bytes)?;
        tracing::info!(shard = pending.index, bytes = bytes.len(), "shard written");
    }
    Ok(())
}

/// Merge one shard's units; a single unit passes through untouched
pub fn merge_units(codec: &dyn MergeCodec, units: &[CompiledUnit]) -> Result<Vec<u8>> {
    let payloads: Vec<Arc<[u8]>> = units.iter().map(CompiledUnit::payload_arc).collect();
    merge_or_pass(codec, &payloads)
}

fn merge_or_pass(codec: &dyn MergeCodec, payloads: &[Arc<[u8]>]) -> Result<Vec<u8>> {
    match payloads {
        [] => Err(ShardError::Merge {
            message: "nothing to merge".to_string(),
        }),
        [only] => Ok(only.to_vec()),
        _ => merge_with_recovery(codec, payloads),
    }
}

/// Merge, halving the batch on capacity failures until halves of two units
/// still fail
fn merge_with_recovery(codec: &dyn MergeCodec, payloads: &[Arc<[u8]>]) -> Result<Vec<u8>> {
    match codec.merge(payloads) {
        Ok(bytes) => Ok(bytes),
        Err(MergeError::Capacity { .. }) if payloads.len() >= 3 => {
            let mid = payloads.len() / 2;
            tracing::warn!(
                units = payloads.len(),
                left = mid,
                right = payloads.len() - mid,
                "merge exceeded codec capacity, splitting batch"
            );
            let left: Arc<[u8]> = merge_or_pass(codec, &payloads[..mid])?.into();
            let right: Arc<[u8]> = merge_or_pass(codec, &payloads[mid..])?.into();
            merge_with_recovery(codec, &[left, right])
        }
        Err(err @ MergeError::Capacity { .. }) => Err(ShardError::MergeCapacity {
            units: payloads.len(),
            message: err.to_string(),
        }),
        Err(MergeError::Invalid(message)) => Err(ShardError::Merge { message }),
    }
}
