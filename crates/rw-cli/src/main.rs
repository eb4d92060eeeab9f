//! Demo runner for the Relative World simulation engine.

mod commands;

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::run::Scenario;

#[derive(Parser)]
#[command(
    name = "rw",
    about = "Relative World: tick-based entity trees and event propagation",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demo scenario and print every event as it is heard
    Run {
        /// Scenario to run
        #[arg(value_enum)]
        scenario: Scenario,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "8")]
        ticks: u64,

        /// Wall-clock pause between ticks, in milliseconds
        #[arg(short, long, default_value = "0")]
        interval_ms: u64,

        /// Simulated minutes per tick
        #[arg(long, default_value = "15")]
        step_minutes: u32,

        /// Simulated start time (RFC 3339, default: now)
        #[arg(long)]
        start: Option<String>,

        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
    },

    /// Describe a timestamp relative to another (default: now)
    Relative {
        /// Timestamp to describe (RFC 3339)
        timestamp: String,

        /// Reference time (RFC 3339, default: now)
        #[arg(short, long)]
        until: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            scenario,
            ticks,
            interval_ms,
            step_minutes,
            start,
            json,
        } => commands::run::run(
            scenario,
            ticks,
            interval_ms,
            step_minutes,
            start.as_deref(),
            json,
        ),
        Commands::Relative { timestamp, until } => {
            commands::relative::run(&timestamp, until.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
