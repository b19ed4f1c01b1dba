//! dexshard CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dexshard::cli::{Cli, Commands};
use dexshard::commands::{run_merge, run_split, CommandContext};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run(cli: &Cli) -> dexshard::Result<String> {
    let ctx = CommandContext::from_cli(cli.format, cli.verbose);
    match &cli.command {
        Commands::Split(args) => run_split(args, &ctx),
        Commands::Merge(args) => run_merge(args, &ctx),
    }
}

/// Log to stderr; `RUST_LOG` takes precedence over `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose { "dexshard=debug" } else { "dexshard=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
