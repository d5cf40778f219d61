use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use dinesim::config_loader::{self, CliOverrides};
use dinesim::report::generate_json_report;
use dinesim::{Coordinator, SimulationConfig, SimulationReport};

/// Dining philosophers simulation with timeout-based resource acquisition
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Total simulation duration in seconds [default: 10.0]
    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = parse_seconds,
        allow_negative_numbers = true
    )]
    run_time: Option<f64>,

    /// Upper bound on the think phase in seconds [default: 1.5]
    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = parse_seconds,
        allow_negative_numbers = true
    )]
    max_think: Option<f64>,

    /// Upper bound on the eat phase in seconds [default: 1.0]
    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = parse_seconds,
        allow_negative_numbers = true
    )]
    max_eat: Option<f64>,

    /// Budget for acquiring both resources in seconds [default: 1.0]
    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = parse_seconds,
        allow_negative_numbers = true
    )]
    timeout: Option<f64>,

    /// Time since the last meal that flags starvation, in seconds [default: 5.0]
    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = parse_seconds,
        allow_negative_numbers = true
    )]
    starvation_limit: Option<f64>,

    /// Number of agents around the table [default: 5]
    #[arg(long, value_parser = clap::value_parser!(u16).range(2..))]
    agents: Option<u16>,

    /// YAML configuration file; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write the report as JSON to this path
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            agents: self.agents.map(usize::from),
            run_time: self.run_time,
            max_think: self.max_think,
            max_eat: self.max_eat,
            timeout: self.timeout,
            starvation_limit: self.starvation_limit,
        }
    }
}

/// Accept only positive, finite numbers of seconds
fn parse_seconds(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("must be positive, got {}", value));
    }
    Ok(seconds)
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    let mut config = match &args.config {
        Some(path) => config_loader::load_config(path)?,
        None => SimulationConfig::default(),
    };
    config_loader::apply_cli_overrides(&mut config, &args.overrides())?;
    let coordinator = Coordinator::new(config)?;
    info!("Simulation configuration: {:?}", coordinator.config());

    let snapshot = coordinator.run()?;
    let report = SimulationReport::new(snapshot);
    report.print();

    if let Some(path) = &args.json {
        generate_json_report(&report, path)?;
    }

    Ok(())
}
