// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmframe CLI
//!
//! Inspect, drive and clean up shared memory frame regions.

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

/// shmframe - single-slot shared memory frame exchange
#[derive(Parser)]
#[command(name = "shmframe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (overrides --name and --capacity)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Region name
    #[arg(short, long, default_value = "shmframe")]
    pub name: String,

    /// Payload capacity in bytes
    #[arg(long, default_value_t = shmframe_core::config::DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the region header
    Status,

    /// Reset the slot to empty
    Clear,

    /// Take the pending frame
    Read {
        /// Write the payload to this file
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Publish a file as one frame
    Write {
        /// Payload file
        #[arg(short, long)]
        file: String,

        /// Frame kind
        #[arg(short, long, value_enum)]
        kind: KindArg,

        /// Width (image, height map) or point count (point cloud)
        #[arg(long)]
        width: u32,

        /// Height (image, height map) or values per point (point cloud)
        #[arg(long, default_value_t = 1)]
        height: u32,

        /// Channels per pixel (image only)
        #[arg(long, default_value_t = 1)]
        channels: u32,

        /// Sample spacing along X (height map only)
        #[arg(long, default_value_t = 1.0)]
        x_spacing: f32,

        /// Sample spacing along Y (height map only)
        #[arg(long, default_value_t = 1.0)]
        y_spacing: f32,
    },

    /// Print frames as they arrive
    Watch {
        /// Exit after this many frames
        #[arg(long)]
        count: Option<usize>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },

    /// Unlink the region's shared memory objects
    Remove,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Image,
    PointCloud,
    HeightMap,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    if let Commands::Validate { file } = &cli.command {
        return commands::validate::execute(file);
    }

    let config = commands::resolve_config(cli.config.as_deref(), &cli.name, cli.capacity)?;

    // Dispatch to command handlers
    match cli.command {
        Commands::Status => commands::status::execute(config),
        Commands::Clear => commands::clear::execute(config),
        Commands::Read { out } => commands::read::execute(config, out.as_deref()),
        Commands::Write {
            file,
            kind,
            width,
            height,
            channels,
            x_spacing,
            y_spacing,
        } => {
            let info = commands::write::frame_info(
                kind, width, height, channels, x_spacing, y_spacing,
            );
            commands::write::execute(config, &file, &info)
        }
        Commands::Watch { count } => commands::watch::execute(config, count),
        Commands::Validate { .. } => Ok(()),
        Commands::Remove => commands::remove::execute(config),
    }
}
