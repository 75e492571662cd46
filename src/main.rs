//! LineRelay - Token relay along a line of agents
//!
//! Runs five (or more) agents that pass integer tokens back and forth
//! along a line, either in a discrete-event simulation or over loopback TCP.

mod agent;
mod config;
mod network;
mod protocol;
mod relay;
mod sim;
mod topology;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use network::NetworkConfig as NetConfig;
use relay::{RelayCoordinator, RunReport};

/// LineRelay - Token relay along a line of agents
#[derive(Parser)]
#[command(name = "linerelay")]
#[command(author = "LineRelay Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Relay tokens along a line of agents", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay in the discrete-event simulator
    Simulate {
        /// Seed for reproducible token values
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of agents in the line
        #[arg(short = 'n', long)]
        line_length: Option<usize>,

        /// Time at which the origin sends the first token
        #[arg(long)]
        start: Option<f64>,

        /// Time at which every agent stops
        #[arg(long)]
        stop: Option<f64>,

        /// Write the full run report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Run the relay over loopback TCP
    Live {
        /// Agent `p` listens on `base_port + p`
        #[arg(short, long)]
        base_port: Option<u16>,

        /// Wall-clock length of one time unit in ms
        #[arg(short, long)]
        time_unit_ms: Option<u64>,

        /// Seed for reproducible token values
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the full run report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol and runtime information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Simulate {
            seed,
            line_length,
            start,
            stop,
            report,
        } => {
            if let Some(seed) = seed {
                config.relay.seed = Some(seed);
            }
            if let Some(line_length) = line_length {
                config.relay.line_length = line_length;
            }
            if let Some(start) = start {
                config.relay.start_offset = start;
            }
            if let Some(stop) = stop {
                config.relay.stop_deadline = stop;
            }
            run_simulation(config, report)?;
        }
        Commands::Live {
            base_port,
            time_unit_ms,
            seed,
            report,
        } => {
            if let Some(base_port) = base_port {
                config.network.base_port = base_port;
            }
            if let Some(time_unit_ms) = time_unit_ms {
                config.network.time_unit_ms = time_unit_ms;
            }
            if let Some(seed) = seed {
                config.relay.seed = Some(seed);
            }
            run_live(config, report).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_info(&config);
        }
    }

    Ok(())
}

/// Run the relay in the simulator
fn run_simulation(config: Config, report_path: Option<PathBuf>) -> anyhow::Result<()> {
    let coordinator = RelayCoordinator::from_config(config.relay)?;
    let report = coordinator.run_configured()?;
    finish(&report, report_path)
}

/// Run the relay over loopback TCP
async fn run_live(config: Config, report_path: Option<PathBuf>) -> anyhow::Result<()> {
    config.validate()?;
    let time_unit = Duration::from_millis(config.network.time_unit_ms);
    let network = NetConfig::from(&config.network);

    tracing::info!(
        "Starting {} agents on {} ports {}..",
        config.relay.line_length,
        network.bind_address,
        network.base_port
    );

    let coordinator = RelayCoordinator::from_config(config.relay)?;
    let report = coordinator.run_live(&network, time_unit).await?;
    finish(&report, report_path)
}

fn finish(report: &RunReport, report_path: Option<PathBuf>) -> anyhow::Result<()> {
    println!("{}", report);
    if let Some(path) = report_path {
        report.write_json(&path)?;
        println!("Report written to: {}", path.display());
    }
    Ok(())
}

/// Print protocol and runtime information
fn print_info(config: &Config) {
    println!("LineRelay Information");
    println!("=====================\n");

    println!("Protocol version: {}", protocol::PROTOCOL_VERSION);
    println!("Frame header: {} bytes", protocol::HEADER_SIZE);
    println!("Token payload: {} bytes", protocol::TOKEN_WIRE_SIZE);

    println!("\nRelay:");
    println!("  Line length: {}", config.relay.line_length);
    println!(
        "  Schedule: start {} stop {}",
        config.relay.start_offset, config.relay.stop_deadline
    );
    println!("  Token range: {}", config.relay.random_range());

    println!("\nLive runtime:");
    println!(
        "  Ports: {}:{}+",
        config.network.bind_address, config.network.base_port
    );
    println!("  Time unit: {} ms", config.network.time_unit_ms);

    if let Some(dir) = dirs::config_dir() {
        println!("\nConfig file: {}", dir.join("linerelay/config.toml").display());
    }
}
