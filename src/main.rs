// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

mod cli;

#[derive(Parser)]
#[command(name = "qrscan")]
#[command(about = "Log every QR code a camera feed sees")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/qrscan/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scan database (overrides the configured path)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay image files as a camera feed and log the QR codes seen
    Scan {
        /// Image files or directories of images
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Delay between frames in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Latitude to attach to scans
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude to attach to scans
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Stop after this many seconds even if frames remain
        #[arg(short, long)]
        duration: Option<u64>,

        /// Keep scans in memory only (nothing is written to the database)
        #[arg(long)]
        memory: bool,
    },

    /// Decode the QR codes in a single image
    Decode {
        /// Image file
        image: PathBuf,
    },

    /// List stored scans, newest first
    History,

    /// Show the details of one scan
    Show {
        /// Scan id (from 'qrscan history')
        id: Uuid,

        /// Write the stored still image to this file
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Delete every stored scan
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Export all scans as CSV plus images
    Export {
        /// Directory the export folder is created in (default: ~/Documents)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qrscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Scan {
            paths,
            interval_ms,
            lat,
            lon,
            duration,
            memory,
        } => cli::scan(
            config,
            cli::ScanOptions {
                paths,
                interval_ms,
                location: lat.zip(lon),
                duration,
                memory,
            },
        ),
        Commands::Decode { image } => cli::decode(&config, &image),
        Commands::History => cli::history(&config),
        Commands::Show { id, image } => cli::show(&config, id, image),
        Commands::Clear { yes } => cli::clear(&config, yes),
        Commands::Export { output } => cli::export(&config, output),
    }
}
