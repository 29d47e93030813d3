//! Interactive entry point
//!
//! Loads a scenario, builds the HTTP decision source, and drives the
//! scheduler from a small command loop. Each tick is run to completion
//! on an explicit runtime so the loop itself stays synchronous.

use geollm::core::error::Result;
use geollm::llm::{HttpSource, InferenceConfig};
use geollm::scenario::load_scenario;
use geollm::sim::{RunState, Scheduler, TickReport};

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "geollm", about = "Interactive geospatial agent simulation")]
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

fn main() -> Result<()> {
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

    let rt = Runtime::new()?;
    let mut scheduler = Scheduler::new(state, source);
    scheduler.start();

    println!("\n=== {} ===", scheduler.scenario().rules.name);
    println!(
        "{} agents, {} locations",
        scheduler.scenario().agents().len(),
        scheduler.scenario().locations().len()
    );
    println!();
    println!("Commands:");
    println!("  tick / t   - Advance the simulation by one tick");
    println!("  run <n>    - Run n ticks");
    println!("  status / s - Show agent positions and statuses");
    println!("  stop       - Terminate the run");
    println!("  quit / q   - Finalize and exit");
    println!();

    loop {
        print!("[day {} {}] > ", scheduler.day(), scheduler.time());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "q" {
            break;
        }

        if input == "tick" || input == "t" {
            match rt.block_on(scheduler.tick())? {
                Some(report) => print_report(&report),
                None => println!("Run is {:?}; nothing to do.", scheduler.run_state()),
            }
            continue;
        }

        if let Some(n) = input.strip_prefix("run ") {
            match n.parse::<u64>() {
                Ok(n) => {
                    for _ in 0..n {
                        match rt.block_on(scheduler.tick())? {
                            Some(report) => print_report(&report),
                            None => break,
                        }
                    }
                    if scheduler.run_state() == RunState::Terminated {
                        println!("Run terminated.");
                    }
                }
                Err(_) => println!("Usage: run <number>"),
            }
            continue;
        }

        if input == "status" || input == "s" {
            print_status(&scheduler);
            continue;
        }

        if input == "stop" {
            scheduler.stop_handle().store(true, std::sync::atomic::Ordering::SeqCst);
            rt.block_on(scheduler.tick())?;
            println!("Run terminated.");
            continue;
        }

        println!("Unknown command: {input}");
    }

    let path = scheduler.finalize(&args.out)?;
    println!(
        "Record written to {} ({})",
        path.display(),
        scheduler.record().summary()
    );
    Ok(())
}

fn print_report(report: &TickReport) {
    println!("tick {} ({}, day {})", report.tick, report.time, report.day);
    for outcome in &report.outcomes {
        println!(
            "  {:<20} {:<12} {}",
            outcome.agent,
            outcome.status.as_str(),
            outcome.action
        );
    }
}

fn print_status<S: geollm::llm::DecisionSource>(scheduler: &Scheduler<S>) {
    let state = scheduler.scenario();
    println!(
        "tick {}, day {}, {} of {} agents active",
        scheduler.record().len() / state.agents().len().max(1),
        scheduler.day(),
        state.active_count(),
        state.agents().len()
    );
    for agent in state.agents() {
        println!(
            "  {:<20} {:?} at ({:.5}, {:.5}) -> {}",
            agent.name,
            agent.status,
            agent.position.x(),
            agent.position.y(),
            agent.goal
        );
    }
}
