//! Parses the command line arguments.
//!
//! Basic usage for running the fan-in simulation with logging on:
//!
//! ```cargo run -- --simulation fan-in --log```

use crate::simulations::{self, SimulationError, Summary};
use clap::{Parser, ValueEnum};
use std::{
    fs::{create_dir_all, OpenOptions},
    io,
    path::PathBuf,
    sync::Arc,
};
use switchyard_core::{config::ConfigError, Config};
use thiserror::Error as ThisError;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;

/// Stores the different command line arguments.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    ///Logging flag. Used to turn logging on or off.
    #[arg(short, long)]
    log: bool,
    /// TOML file to read the simulator configuration from
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Overrides the configured random seed
    #[arg(short, long)]
    seed: Option<u64>,
    /// The simulation to run
    #[arg(long, value_enum, default_value_t = Simulation::PingPong)]
    simulation: Simulation,
}

/// The prebuilt simulations that can be run from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Simulation {
    PingPong,
    FanIn,
    Loopback,
    Framing,
}

impl Simulation {
    /// Runs the simulation with `config`.
    pub async fn run(self, config: Config) -> Result<Summary, SimulationError> {
        match self {
            Simulation::PingPong => simulations::ping_pong(config).await,
            Simulation::FanIn => simulations::fan_in(config).await,
            Simulation::Loopback => simulations::loopback(config).await,
            Simulation::Framing => simulations::framing(config).await,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum CliError {
    #[error("Failed to open the log file: {0}")]
    LogFile(#[from] io::Error),
    #[error("Failed to install the log subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Simulation failed: {0}")]
    Simulation(#[from] SimulationError),
}

/// Parses command line arguments and runs the chosen simulation.
pub async fn initialize_from_arguments() {
    let cli = Args::parse();
    match run(cli).await {
        Ok(summary) => println!("{summary}"),
        Err(e) => eprintln!("{e}"),
    }
}

async fn run(cli: Args) -> Result<Summary, CliError> {
    // Capture log flag for turning logging on or off
    if cli.log {
        initialize_logging()?;
    }
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(seed) = cli.seed {
        config.tools.simulator.seed = seed;
    }
    tracing::info!(simulation = ?cli.simulation, ?config, "starting simulation");
    Ok(cli.simulation.run(config).await?)
}

/// Initializes the event protocol. Only should be called once when the sim
/// starts. Writes JSON events to a timestamped file under `./logs`.
fn initialize_logging() -> Result<(), CliError> {
    let main_path = "./logs";
    create_dir_all(main_path)?;
    let file_path = format!(
        "{}/debug-{}.log",
        main_path,
        chrono::offset::Local::now().format("%y-%m-%d_%H-%M-%S")
    );
    let file = OpenOptions::new()
        .write(true)
        .append(true)
        .create(true)
        .open(file_path)?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(Arc::new(file))
        .json()
        .finish();
    // set the global default so all events/logs go to the same subscriber and
    // subsequently the same file
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
