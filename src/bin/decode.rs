//! Decode binary - decodes recorded raw buffers with a level calibration
//!
//! Usage:
//!   cargo run --bin decode -- buffers.txt                        # Config defaults
//!   cargo run --bin decode -- -c levels.dat --format 3 buffers.txt
//!   cargo run --bin decode -- -n 8 --json buffers.txt            # JSON lines

use clap::Parser;
use pixel_readout::calibration::CalibrationHandle;
use pixel_readout::common::DecodeArgs;
use pixel_readout::config::Config;
use pixel_readout::reader::{DecodeStatistics, ReadoutDecoder, TextBufferReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Decode - turns raw analog readout buffers into pixel hits
#[derive(Parser, Debug)]
#[command(name = "decode", about = "Decode raw TBM/ROC readout buffers")]
#[command(version)]
struct Args {
    #[command(flatten)]
    decode: DecodeArgs,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pixel_readout=info".parse()?),
        )
        .init();

    let args = Args::parse().decode;

    let mut config = Config::load_or_default(&args.common.config_file)?;
    config.apply_calibration_args(&args.calibration)?;
    let num_rocs = config.decoder.num_rocs;

    let calibration = config.load_calibration()?;
    let decoder = ReadoutDecoder::new(
        CalibrationHandle::new(calibration),
        config.decoder.readout_config(),
    );

    let mut stats = DecodeStatistics::new();
    for (index, buffer) in TextBufferReader::open(&args.input)?.enumerate() {
        let buffer = buffer?;
        let result = decoder.decode(&buffer, num_rocs);
        match &result {
            Ok(module) if args.json => println!("{}", serde_json::to_string(module)?),
            Ok(module) => {
                println!("{:6} {}", index, module);
                for pixel in module.pixels() {
                    println!(
                        "       ROC {:2} col {:2} row {:2} -> ({:3}, {:3}) ph {:5}",
                        pixel.roc_id,
                        pixel.column_roc,
                        pixel.row_roc,
                        pixel.column_module,
                        pixel.row_module,
                        pixel.analog_pulse_height
                    );
                }
            }
            Err(e) => warn!(buffer = index, error = %e, "Decode failed"),
        }
        stats.record(&result);
    }

    info!(
        buffers = stats.buffers,
        decoded = stats.decoded,
        pixel_hits = stats.pixel_hits,
        "Decoding finished"
    );
    println!();
    println!("Buffers:             {}", stats.buffers);
    println!(
        "Decoded:             {} ({:.1}%)",
        stats.decoded,
        stats.efficiency() * 100.0
    );
    println!("No header:           {}", stats.no_header);
    println!("Capacity exceeded:   {}", stats.capacity_exceeded);
    println!("Other errors:        {}", stats.other_errors);
    println!("Pixel hits:          {}", stats.pixel_hits);
    println!("ROCs without header: {}", stats.rocs_without_header);
    println!("Dropped pixels:      {}", stats.dropped_pixels);
    println!("Trailers missing:    {}", stats.trailers_missing);

    Ok(())
}
