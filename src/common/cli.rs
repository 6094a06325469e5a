//! CLI argument parsing for the readout tools
//!
//! # Design Principles (KISS)
//! - Use clap's derive macro for declarative argument definition
//! - Common arguments shared via composition, not inheritance
//! - Each binary has its own Args struct that embeds CommonArgs

use std::path::PathBuf;

use clap::Parser;

/// Common arguments shared across all tools
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(short = 'f', long = "config", default_value = "config.toml")]
    pub config_file: String,
}

/// Calibration source overrides (take precedence over the config file)
#[derive(Parser, Debug, Clone)]
pub struct CalibrationArgs {
    /// Calibration file to load
    #[arg(short = 'c', long = "calibration")]
    pub calibration_file: Option<PathBuf>,

    /// Calibration file format (1, 2 or 3)
    #[arg(long = "format")]
    pub format: Option<u8>,

    /// Number of ROCs on the module
    #[arg(short = 'n', long = "rocs")]
    pub num_rocs: Option<usize>,
}

/// Arguments for the decode tool
#[derive(Parser, Debug, Clone)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub calibration: CalibrationArgs,

    /// Raw buffer file (one buffer per line)
    pub input: PathBuf,

    /// Print each decoded module as one JSON line
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the auto-calibration tool
#[derive(Parser, Debug, Clone)]
pub struct AutocalArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub calibration: CalibrationArgs,

    /// Raw buffer file (one buffer per line)
    pub input: PathBuf,

    /// Where to write the new calibration (format 3 dump)
    #[arg(short = 'o', long = "output", default_value = "levels.dat")]
    pub output: PathBuf,
}

/// Arguments for the emulator tool
#[derive(Parser, Debug, Clone)]
pub struct EmulatorArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of buffers to generate
    #[arg(short = 'e', long = "events", default_value = "100")]
    pub events: usize,

    /// Raw buffer output file
    #[arg(short = 'o', long = "output", default_value = "buffers.txt")]
    pub output: PathBuf,

    /// Also write the matching calibration dump here
    #[arg(long = "calibration-out")]
    pub calibration_out: Option<PathBuf>,

    /// Override the RNG seed
    #[arg(long)]
    pub seed: Option<u64>,
}
