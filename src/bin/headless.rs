//! Batch runner: load a scenario, run it to completion, write the CSV.
//!
//! Intended for unattended runs against a local inference service. The
//! stop flag is wired to Ctrl-C so an interrupted run still finalizes
//! its record.

use geollm::core::error::Result;
use geollm::llm::{HttpSource, InferenceConfig};
use geollm::scenario::load_scenario;
use geollm::sim::Scheduler;

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

#[derive(Parser, Debug)]
#[command(name = "geollm-headless", about = "Run a scenario to completion")]
struct Args {
    /// Scenario directory (scenario.toml, locations.json, agents.json)
    scenario: PathBuf,

    /// Base URL of the inference service
    #[arg(long)]
    endpoint: Option<String>,

    /// Model name passed to the inference service
    #[arg(long)]
    model: Option<String>,

    /// Prompt cache file; omit to disable caching
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Directory for run output
    #[arg(long, default_value = "output")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geollm=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = InferenceConfig::from_env();
    if let Some(endpoint) = args.endpoint {
        config.base_url = endpoint;
    }
    if let Some(model) = args.model {
        config.model = model;
    }

    let state = load_scenario(&args.scenario)?;
    let mut source = HttpSource::new(config);
    if let Some(cache) = &args.cache {
        source = source.with_cache(cache)?;
    }

    let mut scheduler = Scheduler::new(state, source);

    let stop = scheduler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            stop.store(true, Ordering::SeqCst);
        }
    });

    scheduler.run_to_completion().await?;
    let path = scheduler.finalize(&args.out)?;

    println!(
        "{}: {} ticks recorded, {}",
        path.display(),
        scheduler.record().len() / scheduler.scenario().agents().len().max(1),
        scheduler.record().summary()
    );
    Ok(())
}
