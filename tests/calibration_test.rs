//! E2E tests for calibration files and auto-calibration
//!
//! Calibrations travel through real files in the temp directory and are
//! checked by decoding seeded emulator buffers with them.

use std::path::PathBuf;

use pixel_readout::calibration::{
    AutoCalibrator, Calibration, CalibrationFormat, CalibrationLoader, RocLevels, TbmLevels,
};
use pixel_readout::common::{AdcWord, ConfigurationError};
use pixel_readout::config::Config;
use pixel_readout::data_source_emulator::{EmulatorConfig, ReadoutEmulator};
use pixel_readout::reader::{decode_with, TextBufferReader, TextBufferWriter};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pixel_readout_{}_{}", std::process::id(), name))
}

fn emulator(seed: u64) -> ReadoutEmulator {
    ReadoutEmulator::new(EmulatorConfig {
        seed: Some(seed),
        ..Default::default()
    })
    .expect("emulator config")
}

/// Marker levels right, data levels far off
fn marker_only_seed(num_rocs: usize) -> Calibration {
    let tbm = TbmLevels::new(-950, -550, [-500, -450, -300, -100, 2000]);
    let roc = RocLevels::new(-950, -575, [-560, -540, -520, -500, -480, -460, 2000]);
    Calibration::from_tables(tbm, vec![roc; num_rocs])
}

#[test]
fn test_dump_file_roundtrip_decodes_identically() {
    let mut emulator = emulator(21);
    let calibration = emulator.calibration();
    let path = temp_path("dump.dat");

    CalibrationLoader::save_dump(&calibration, &path).expect("save");
    let loaded = CalibrationLoader::load_file(&path, CalibrationFormat::Dump, 16).expect("load");
    std::fs::remove_file(&path).expect("cleanup");

    assert_eq!(loaded, calibration);
    for _ in 0..20 {
        let (_, buffer) = emulator.generate().expect("generate");
        assert_eq!(
            decode_with(&loaded, &buffer, 16).expect("decode"),
            decode_with(&calibration, &buffer, 16).expect("decode")
        );
    }
}

#[test]
fn test_compact_file_with_roc0_only_covers_module() {
    let content = "\
-950 -550
-2000 -575 -350 -150 50 250 450 2000
-550 -200 200 600 2000
";
    let path = temp_path("compact.dat");
    std::fs::write(&path, content).expect("write");

    let mut config = Config::default();
    config.calibration.file = Some(path.clone());
    config.calibration.format = CalibrationFormat::Compact;
    let loaded = config.load_calibration().expect("load");
    std::fs::remove_file(&path).expect("cleanup");

    // ROC 0 is copied to all ROCs; parsing stops there, TBM levels unread
    let roc0 = *loaded.roc(0).expect("roc 0");
    assert!(loaded.rocs().iter().all(|roc| *roc == roc0));
    assert!(!loaded.tbm.is_strictly_increasing());

    // ROC levels match the emulator's, so hit addresses still decode
    let mut emulator = emulator(22);
    let (module, buffer) = emulator.generate().expect("generate");
    let mut reference = emulator.calibration();
    reference.tbm = loaded.tbm;
    let decoded = decode_with(&loaded, &buffer, 16).expect("decode");
    assert_eq!(decoded.num_pixel_hits, module.num_pixel_hits);
    assert!(decoded.pixels().eq(module.pixels()));
    assert_eq!(decoded, decode_with(&reference, &buffer, 16).expect("decode"));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = CalibrationLoader::load_file(temp_path("absent.dat"), CalibrationFormat::Plain, 1)
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::Io(_)));
}

#[test]
fn test_auto_calibration_from_buffer_file() {
    let mut emulator = emulator(23);
    let path = temp_path("buffers.txt");

    let mut writer = TextBufferWriter::create(&path).expect("create");
    writer.write_comment("autocal input").expect("comment");
    let mut modules = Vec::new();
    for _ in 0..300 {
        let (module, buffer) = emulator.generate().expect("generate");
        writer.write_buffer(&buffer).expect("write");
        modules.push(module);
    }
    writer.finish().expect("flush");

    let mut calibrator = AutoCalibrator::new(marker_only_seed(16), 16);
    let buffers: Vec<Vec<AdcWord>> = TextBufferReader::open(&path)
        .expect("open")
        .collect::<Result<_, _>>()
        .expect("read");
    std::fs::remove_file(&path).expect("cleanup");
    for buffer in &buffers {
        assert!(calibrator.accumulate(buffer));
    }

    let report = calibrator.finish();
    assert!(report.is_complete(), "failed: {:?}", report.failed);
    assert_eq!(report.frames, 300);
    assert!(report.calibration.is_strictly_increasing());

    for (buffer, module) in buffers.iter().zip(&modules) {
        let decoded = decode_with(&report.calibration, buffer, 16).expect("decode");
        assert_eq!(&decoded, module);
    }
}

#[test]
fn test_seed_calibration_misdecodes_data() {
    let mut emulator = emulator(24);
    let seed = marker_only_seed(16);
    let mut dropped = 0;
    for _ in 0..20 {
        let (_, buffer) = emulator.generate().expect("generate");
        let decoded = decode_with(&seed, &buffer, 16).expect("markers still located");
        dropped += decoded.failures.dropped_pixels();
    }
    assert!(dropped > 0);
}
