//! Command-line front end for the facility simulator
//!
//! ```text
//! checkpoint run --preset airport --capacities 2,3 --trace
//! checkpoint sweep --config configs/airport.toml --csv sweep.csv
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use checkpoint::output::{self, render_result, render_table};
use checkpoint::{ExperimentFile, FacilityConfig, Sweep, SweepErrorPolicy, SweepSettings, TraceRecord};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, trace};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "checkpoint")]
#[command(about = "Discrete-event simulation of a two-stage service facility")]
#[command(version)]
struct Cli {
    /// Log run start and end for every simulation
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one capacity configuration
    Run {
        #[command(flatten)]
        facility: FacilityArgs,

        /// Capacity per stage, comma-separated
        #[arg(short, long, value_delimiter = ',')]
        capacities: Option<Vec<usize>>,

        /// Log every entity transition
        #[arg(long)]
        trace: bool,

        /// Write the result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Simulate every capacity combination of a grid
    Sweep {
        #[command(flatten)]
        facility: FacilityArgs,

        /// Sweep each stage over 1..=N (overrides the config file's [sweep])
        #[arg(long)]
        max_capacity: Option<usize>,

        /// Record failing combinations instead of stopping at the first
        #[arg(long)]
        continue_on_error: bool,

        #[arg(long)]
        threads: Option<usize>,

        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(long)]
        json: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Airport,
    Carwash,
}

#[derive(Args)]
struct FacilityArgs {
    #[arg(long, value_enum, default_value = "airport", conflicts_with = "config")]
    preset: Preset,

    /// TOML file with a [facility] table and optional [sweep] table
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    horizon: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,
}

impl FacilityArgs {
    fn load(&self) -> Result<ExperimentFile> {
        let mut file = match &self.config {
            Some(path) => ExperimentFile::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ExperimentFile {
                facility: match self.preset {
                    Preset::Airport => FacilityConfig::airport(),
                    Preset::Carwash => FacilityConfig::carwash(),
                },
                sweep: None,
            },
        };
        if let Some(horizon) = self.horizon {
            file.facility.horizon = horizon;
        }
        if let Some(seed) = self.seed {
            file.facility.seed = seed;
        }
        Ok(file)
    }
}

fn init_logging(verbose: bool, trace: bool) {
    let default = if trace {
        "info,checkpoint=trace"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_transition(record: &TraceRecord) {
    trace!(entity = record.entity, time = record.time, "{}", record.transition);
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            facility,
            capacities,
            trace,
            json,
        } => {
            init_logging(cli.verbose, trace);
            let mut config = facility.load()?.facility;
            if let Some(capacities) = capacities {
                config = config.with_capacities(&capacities)?;
            }

            let result = if trace {
                checkpoint::run_once_traced(&config, log_transition)?
            } else {
                checkpoint::run_once(&config)?
            };
            println!("{}", render_result(&config.name, &result));

            if let Some(path) = json {
                output::write_json(&result, &path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "wrote result");
            }
        }

        Commands::Sweep {
            facility,
            max_capacity,
            continue_on_error,
            threads,
            csv,
            json,
        } => {
            init_logging(cli.verbose, false);
            let file = facility.load()?;
            let stages = file.facility.stages.len();
            let settings = match (max_capacity, file.sweep) {
                (Some(max), _) => SweepSettings::up_to(stages, max),
                (None, Some(settings)) => settings,
                (None, None) => SweepSettings::up_to(stages, 3),
            };

            let policy = if continue_on_error || settings.continue_on_error {
                SweepErrorPolicy::Continue
            } else {
                SweepErrorPolicy::Abort
            };
            let mut sweep = Sweep::grid(file.facility, &settings.ranges()).policy(policy);
            if let Some(n) = threads.or(settings.threads) {
                sweep = sweep.threads(n);
            }

            let report = sweep.run().context("sweep aborted")?;
            print!("{}", render_table(&report));

            if let Some(path) = csv {
                output::write_csv(&report, &path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "wrote CSV");
            }
            if let Some(path) = json {
                output::write_report_json(&report, &path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "wrote JSON");
            }
        }
    }

    Ok(())
}
