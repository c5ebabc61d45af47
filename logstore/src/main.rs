//! LogStore measurement harness binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use logstore::perf::{self, CliArgs};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    let config = args.load_config()?;

    tracing::info!("Running workloads with config: {:?}", config);

    let results = perf::run(&args, config)?;
    for result in &results {
        tracing::info!(
            "{}: insert {:.3}us, read {:.3}us",
            result.name,
            result.insert_us,
            result.read_us
        );
    }

    perf::write_results(&args.output, &results)?;
    tracing::info!("Results appended to {}", args.output.display());
    Ok(())
}
