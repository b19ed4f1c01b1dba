//! Split command handler - copy units into index-limited shard directories

use crate::cli::SplitArgs;
use crate::commands::{render_stats, CommandContext};
use crate::error::Result;
use crate::shard::ShardStats;
use crate::sink::DirectorySplitSink;
use crate::source::UnitCatalog;
use crate::splitter::{ShardSplitter, SplitOptions};

/// Run the split command
pub fn run_split(args: &SplitArgs, ctx: &CommandContext) -> Result<String> {
    let config = args.shard.resolve_config()?;
    let catalog = UnitCatalog::from_manifests(&args.shard.manifests)?;
    let main_list = config.load_main_list()?;

    tracing::info!(
        units = catalog.len(),
        max_index = config.max_index_per_shard,
        main_list = main_list.as_ref().map(|l| l.len()),
        "splitting"
    );

    let sink = DirectorySplitSink::new(&args.shard.out)?;
    let mut splitter = ShardSplitter::new(
        sink,
        SplitOptions {
            max_index: config.max_index_per_shard,
            multidex: config.multidex,
            prefix: config.output_prefix.clone(),
        },
    );
    splitter.run(&catalog, main_list.as_ref(), config.minimal_main_shard)?;
    let stats = ShardStats::from_summaries(splitter.close()?);

    render_stats("split_result", &stats, &config.output_prefix, ctx)
}
