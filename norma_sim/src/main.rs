//! Norma simulator CLI
//!
//! Run scenarios against an in-process network and report the load they produced.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use norma_core::{ControllerConfig, Scenario};
use norma_sim::{BuiltinScenario, ClockMode, RunnerConfig, ScenarioRunner};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Norma load-testing simulator
#[derive(Parser, Debug)]
#[command(name = "norma-sim")]
#[command(about = "Run load scenarios against a simulated network", long_about = None)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario
    Run {
        /// Built-in scenario name or path to a YAML file
        scenario: String,

        /// Use virtual time instead of wall time
        #[arg(long)]
        simulated: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Write the report to a JSON file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Master seed for determinism
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Trigger channel capacity per application (default: one slot per user)
        #[arg(long)]
        channel_capacity: Option<usize>,
    },

    /// Validate a scenario and print every issue
    Check {
        /// Built-in scenario name or path to a YAML file
        scenario: String,
    },

    /// List built-in scenarios
    List,
}

/// Resolves a built-in name first, then a file path.
fn load_scenario(arg: &str) -> Result<Scenario> {
    if let Ok(builtin) = arg.parse::<BuiltinScenario>() {
        return builtin
            .scenario()
            .with_context(|| format!("built-in scenario {builtin} is broken"));
    }
    Scenario::parse_file(arg).with_context(|| format!("cannot load scenario '{arg}'"))
}

async fn run(
    scenario: &str,
    simulated: bool,
    json: bool,
    export: Option<PathBuf>,
    seed: u64,
    channel_capacity: Option<usize>,
) -> Result<()> {
    let scenario = load_scenario(scenario)?;
    let mut controller = ControllerConfig::default();
    if let Some(capacity) = channel_capacity {
        controller = controller.with_channel_capacity(capacity);
    }
    let mode = if simulated { ClockMode::Simulated } else { ClockMode::Wall };
    let config = RunnerConfig::default()
        .with_seed(seed)
        .with_clock_mode(mode)
        .with_controller(controller);

    let report = ScenarioRunner::new(config).run(&scenario).await?;

    if let Some(path) = &export {
        report
            .write_to_file(path)
            .with_context(|| format!("failed to export report to {}", path.display()))?;
        info!("Exported report to {}", path.display());
    }

    if json {
        println!("{}", report.to_json()?);
    } else {
        info!("Run {} finished at {}s", report.run_id, report.final_time);
        for app in &report.applications {
            info!(
                "  {}: {} users, {} sent, {} received, {} missed",
                app.name, app.users, app.sent, app.received, app.missed
            );
        }
        info!("  {} nodes, {} rejected transactions", report.nodes, report.rejected);
    }
    Ok(())
}

fn check(scenario: &str) -> Result<()> {
    let scenario = load_scenario(scenario)?;
    match scenario.check() {
        Ok(()) => {
            println!("{}: ok", scenario.name);
            Ok(())
        }
        Err(errors) => {
            for issue in errors.issues() {
                println!("{issue}");
            }
            bail!("scenario {} has {} issue(s)", scenario.name, errors.len())
        }
    }
}

fn list() {
    for builtin in BuiltinScenario::all() {
        println!("{:<10} {}", builtin.name(), builtin.description());
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    let result = match args.command {
        Command::Run {
            scenario,
            simulated,
            json,
            export,
            seed,
            channel_capacity,
        } => run(&scenario, simulated, json, export, seed, channel_capacity).await,
        Command::Check { scenario } => check(&scenario),
        Command::List => {
            list();
            Ok(())
        }
    };

    // Exit with proper code for CI
    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(1);
    }
}
