mod cli;
mod config;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use convergence::{ConvergenceRunner, ShellRunner, StopToken, provider_for, run_pass};

use cli::Cli;
use config::Catalog;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let catalog = Catalog::load(cli.catalog.as_deref())?;
    log::info!("loaded catalog with {} resources", catalog.resources.len());

    let executor = Arc::new(ShellRunner);
    let runner = ConvergenceRunner::new(cli.schedule(), StopToken::new());

    // Resources are rebuilt from the catalog at the start of every
    // pass and discarded at its end; only live state carries over.
    let summary = runner.run(|| {
        let mut providers: Vec<_> = catalog
            .resources
            .iter()
            .map(|spec| provider_for(spec.clone(), executor.clone()))
            .collect();
        run_pass(&mut providers)
    })?;

    log::info!(
        "done: {} updated, {} unchanged",
        summary.updated,
        summary.unchanged
    );
    Ok(())
}
