//! Auto-calibration binary - derives level boundaries from recorded buffers
//!
//! The seed calibration only has to locate the frame markers; the address
//! levels are rebuilt from the sample histograms.
//!
//! Usage:
//!   cargo run --bin autocal -- -c seed.dat buffers.txt
//!   cargo run --bin autocal -- -c seed.dat -o new_levels.dat buffers.txt

use clap::Parser;
use pixel_readout::calibration::{AutoCalibrator, CalibrationLoader};
use pixel_readout::common::AutocalArgs;
use pixel_readout::config::Config;
use pixel_readout::reader::TextBufferReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Autocal - histogram-based level calibration
#[derive(Parser, Debug)]
#[command(name = "autocal", about = "Derive a level calibration from raw buffers")]
#[command(version)]
struct Args {
    #[command(flatten)]
    autocal: AutocalArgs,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pixel_readout=info".parse()?),
        )
        .init();

    let args = Args::parse().autocal;

    let mut config = Config::load_or_default(&args.common.config_file)?;
    config.apply_calibration_args(&args.calibration)?;

    let seed = config.load_calibration()?;
    let mut calibrator = AutoCalibrator::new(seed, config.decoder.num_rocs);

    for buffer in TextBufferReader::open(&args.input)? {
        calibrator.accumulate(&buffer?);
    }
    info!(
        buffers = calibrator.buffers(),
        frames = calibrator.frames(),
        "Histograms filled"
    );
    if calibrator.frames() == 0 {
        anyhow::bail!("no frame located in {}", args.input.display());
    }

    let report = calibrator.finish();
    for (channel, error) in &report.failed {
        warn!(%channel, error = %error, "Calibration failed");
        println!("{}: {}", channel, error);
    }
    CalibrationLoader::save_dump(&report.calibration, &args.output)?;

    println!(
        "Calibrated {} ROCs from {} frames, {} channel(s) failed",
        calibrator.num_rocs(),
        report.frames,
        report.failed.len()
    );
    println!("Wrote {}", args.output.display());

    Ok(())
}
