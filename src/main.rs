//! Generates head-fixed behavioural sessions and uploads them to the task
//! microcontroller.
//!
//! ```bash
//! # Print a session as JSON
//! headfix generate --config rig.json --seed 7
//!
//! # Generate and upload over USB serial
//! headfix upload --config rig.json --port /dev/ttyACM0
//!
//! # Dry run against the simulated device
//! headfix upload --simulate
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use headfix_timing::{HighPrecisionTimer, SimulatedTimer};
use headfix_transfer::{list_ports, LoopbackChannel, SerialPortChannel};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod app;
mod settings;

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "headfix")]
#[command(author, version, about = "Head-fixed task session generator and uploader", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a session and print it as JSON
    Generate {
        /// Settings file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// RNG seed; drawn from entropy and logged when absent
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a session and upload it to the device
    Upload {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Serial port (e.g., /dev/ttyACM0 or COM3)
        #[arg(short, long)]
        port: Option<String>,

        #[arg(short, long)]
        baud: Option<u32>,

        #[arg(short, long)]
        seed: Option<u64>,

        /// Upload to the in-memory echo device instead of a serial port
        #[arg(long)]
        simulate: bool,
    },

    /// List available serial ports
    Ports,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {e}");
    }

    if let Err(e) = run(cli.command) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            config,
            seed,
            output,
        } => {
            let settings = Settings::load(config.as_deref())?;
            let generated = app::generate(&settings, seed)?;
            let json = serde_json::to_string_pretty(&generated)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), seed = generated.seed, "session written");
                }
                None => println!("{json}"),
            }
        }
        Commands::Upload {
            config,
            port,
            baud,
            seed,
            simulate,
        } => {
            let settings = Settings::load(config.as_deref())?.with_link_overrides(port, baud);
            let generated = app::generate(&settings, seed)?;
            let report = if simulate {
                let timer = SimulatedTimer::new();
                app::upload(&settings, &generated, &timer, || Ok(LoopbackChannel::new()))?
            } else {
                let port = settings
                    .link
                    .port
                    .clone()
                    .context("no serial port; pass --port or set link.port")?;
                let timer = HighPrecisionTimer::new();
                app::upload(&settings, &generated, &timer, || {
                    SerialPortChannel::open_with_retry(
                        &port,
                        settings.link.baud,
                        &settings.link.open_retry,
                        &timer,
                    )
                })?
            };
            println!(
                "Uploaded {} packets ({} bytes), seed {}",
                report.packets_sent, report.bytes_sent, generated.seed
            );
            println!(
                "  Echo latency: mean {:.3} ms, jitter {:.3} ms, max {:.3} ms",
                report.echo_latency.mean_ns / 1e6,
                report.echo_latency.jitter_ns / 1e6,
                report.echo_latency.max_ns / 1e6
            );
        }
        Commands::Ports => {
            let ports = list_ports();
            if ports.is_empty() {
                info!("no serial ports found");
            }
            for port in ports {
                println!("{port}");
            }
        }
    }
    Ok(())
}
