// duelradar entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Initialize tracing (stderr, so stdout stays clean for tables/JSON)
// 3. Load config and build the engine
// 4. Run the requested command

mod command;
mod render;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use duelradar_core::config;
use duelradar_core::Engine;

fn main() -> anyhow::Result<()> {
    let args = command::CommandArgs::parse();
    init_tracing(args.verbose)?;

    let config = config::load_config(args.config.as_deref()).context("failed to load configuration")?;
    debug!(
        "Config loaded: {} datasets, {} percentiles",
        config.datasets.len(),
        config.percentile.label()
    );

    let engine = Engine::new(config);
    command::run(&engine, args.mode)
}

/// Initialize tracing to stderr. `RUST_LOG` overrides the default filter.
fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose {
        "duelradar=debug,duelradar_core=debug,warn"
    } else {
        "warn"
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_line_number(verbose)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
