//! Merge command handler - merge units into one payload per shard

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::aggregator::{AggregateOptions, ShardAggregator};
use crate::cli::MergeArgs;
use crate::codec::{FramedCodec, MergeCodec};
use crate::commands::{render_stats, CommandContext};
use crate::config::ShardingConfig;
use crate::error::{Result, ShardError};
use crate::shard::ShardStats;
use crate::sink::DirectorySink;
use crate::source::UnitCatalog;

/// Run the merge command
pub fn run_merge(args: &MergeArgs, ctx: &CommandContext) -> Result<String> {
    let config = args.resolve_config()?;
    let catalog = UnitCatalog::from_manifests(&args.shard.manifests)?;
    let main_list = config.load_main_list()?;

    let codec: Arc<dyn MergeCodec> = match args.max_batch {
        Some(limit) => Arc::new(FramedCodec::with_max_batch(limit)),
        None => Arc::new(FramedCodec::new()),
    };
    let sink = DirectorySink::new(
        &args.shard.out,
        &config.output_prefix,
        &config.output_extension,
    )?;

    tracing::info!(
        units = catalog.len(),
        max_index = config.max_index_per_shard,
        threads = config.worker_threads,
        "merging"
    );

    let mut aggregator = ShardAggregator::new(
        AggregateOptions {
            max_index: config.max_index_per_shard,
            multidex: config.multidex,
            first_index: config.first_shard_index,
            worker_threads: config.worker_threads,
        },
        codec,
        Box::new(sink),
    )?;

    // Close even when feeding fails so the sink is released exactly once
    let fed = feed(&mut aggregator, &catalog, main_list.as_ref(), &config);
    let closed = aggregator.close();
    fed?;
    let stats = ShardStats::from_summaries(closed?);

    render_stats("merge_result", &stats, &config.output_prefix, ctx)
}

/// Add main list units first, then everything else, in name order.
///
/// Listed units must fit the first shard. With `minimal_main_shard` that
/// shard is closed after them; otherwise the rest keep filling it.
fn feed(
    aggregator: &mut ShardAggregator,
    catalog: &UnitCatalog,
    main_list: Option<&BTreeSet<String>>,
    config: &ShardingConfig,
) -> Result<()> {
    let Some(main_list) = main_list else {
        for unit in catalog.units() {
            aggregator.add(unit?)?;
        }
        return Ok(());
    };

    for name in catalog.names().filter(|n| main_list.contains(*n)) {
        aggregator.add(catalog.read(name)?.into_unit()?)?;
    }
    if aggregator.shards_written() > config.first_shard_index {
        return Err(ShardError::configuration(format!(
            "main list ({} entries) does not fit in a single shard of {} indices",
            main_list.len(),
            config.max_index_per_shard
        )));
    }
    if config.minimal_main_shard {
        aggregator.flush()?;
    }

    for name in catalog.names().filter(|n| !main_list.contains(*n)) {
        aggregator.add(catalog.read(name)?.into_unit()?)?;
    }
    Ok(())
}
