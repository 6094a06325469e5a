//! Emulator binary - writes synthetic raw buffers to a text file
//!
//! Usage:
//!   cargo run --bin emulator                              # Use defaults
//!   cargo run --bin emulator -- --config config.toml      # Use config file
//!   cargo run --bin emulator -- -e 1000 --seed 42         # 1000 reproducible buffers
//!   cargo run --bin emulator -- --calibration-out cal.dat # Also write the matching levels

use clap::Parser;
use pixel_readout::calibration::CalibrationLoader;
use pixel_readout::common::EmulatorArgs;
use pixel_readout::config::Config;
use pixel_readout::data_source_emulator::ReadoutEmulator;
use pixel_readout::reader::TextBufferWriter;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Emulator - generates synthetic readout buffers
#[derive(Parser, Debug)]
#[command(name = "emulator", about = "TBM/ROC readout buffer emulator")]
#[command(version)]
struct Args {
    #[command(flatten)]
    emulator: EmulatorArgs,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pixel_readout=info".parse()?),
        )
        .init();

    let args = Args::parse().emulator;

    let config = Config::load_or_default(&args.common.config_file)?;
    let mut emulator_config = config.emulator;
    if args.seed.is_some() {
        emulator_config.seed = args.seed;
    }

    let mut emulator = ReadoutEmulator::new(emulator_config)?;
    let mut writer = TextBufferWriter::create(&args.output)?;
    writer.write_comment(&format!(
        "{} emulated buffers, {} ROCs",
        args.events,
        emulator.config().num_rocs
    ))?;

    let mut hits = 0;
    for _ in 0..args.events {
        let (module, buffer) = emulator.generate()?;
        hits += module.num_pixel_hits;
        writer.write_buffer(&buffer)?;
    }
    let written = writer.buffers_written();
    writer.finish()?;
    info!(buffers = written, hits, "Emulation finished");

    if let Some(path) = &args.calibration_out {
        CalibrationLoader::save_dump(&emulator.calibration(), path)?;
        println!("Wrote matching calibration to {}", path.display());
    }

    println!(
        "Wrote {} buffers ({} pixel hits) to {}",
        written,
        hits,
        args.output.display()
    );

    Ok(())
}
