//! skyresample command-line interface.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skyresample::config::config_file_path;
use skyresample::{Parallelism, PartitionAxis};

use commands::config::ConfigCommands;
use commands::reproject::ReprojectArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "skyresample")]
#[command(version, about = "Flux-conserving reprojection between celestial pixel grids", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.skyresample/config.ini)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reproject an image onto the output grid from the configuration file
    Reproject {
        /// Input image
        input: PathBuf,

        /// Output image (16-bit PNG)
        output: PathBuf,

        /// Footprint file (default with `[reproject] footprint = true`:
        /// <output stem>_footprint.png)
        #[arg(long)]
        footprint: Option<PathBuf>,

        /// Worker count, `auto`, or `false` for a single thread
        #[arg(short, long, value_parser = parse_parallelism)]
        parallel: Option<Parallelism>,

        /// Axis of the input image split between workers
        #[arg(long, value_parser = parse_axis)]
        axis: Option<PartitionAxis>,

        /// Reproject the three colour planes instead of greyscale
        #[arg(long)]
        rgb: bool,
    },

    /// View or change configuration settings
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Write a commented configuration file
    Init {
        /// Rewrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_parallelism(value: &str) -> Result<Parallelism, String> {
    value.parse::<Parallelism>().map_err(|e| e.to_string())
}

fn parse_axis(value: &str) -> Result<PartitionAxis, String> {
    value.parse::<PartitionAxis>()
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Reproject {
            input,
            output,
            footprint,
            parallel,
            axis,
            rgb,
        } => commands::reproject::run(
            ReprojectArgs {
                input,
                output,
                footprint,
                parallel,
                axis,
                rgb,
            },
            &config_path,
            cli.verbose,
        ),
        Commands::Config(command) => commands::config::run(command, &config_path),
        Commands::Init { force } => commands::init::run(&config_path, force),
    }
}
