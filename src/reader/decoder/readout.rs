//! Readout decoder: one raw buffer in, one decoded module out
//!
//! # Frame layout
//! ```text
//! TBM header (8) | ROC 0: header (3) + hits (6 each) | ... | ROC n-1 | TBM trailer (8)
//! ```
//!
//! # Failure policy
//! - No TBM header, too many hits on one ROC, or bad call arguments abort the
//!   decode with a [`DecodeError`].
//! - Anything else (missing ROC header, undecodable hit, missing trailer)
//!   is recorded in [`DecodeFailures`](super::common::DecodeFailures) and decoding continues.
//!
//! A decode runs against one calibration snapshot from start to finish.

use tracing::{debug, error, trace};

use super::address::{to_module_coordinates, AddressDecoder};
use super::common::{DecodedReadoutModule, DecodedReadoutPixel, DecodedReadoutRoc, TbmStatus};
use super::frame::FrameLocator;
use crate::calibration::{Calibration, CalibrationHandle};
use crate::common::constants::{
    MAX_BUFFER_LENGTH, MAX_PIXELS_PER_ROC, MAX_ROCS_PER_MODULE, PIXEL_HIT_LENGTH,
    ROC_HEADER_LENGTH, TBM_HEADER_LENGTH, TBM_TRAILER_LENGTH,
};
use crate::common::{AddressError, AdcWord, DecodeError, DecodeResult, FrameMarker};

/// Readout decoder configuration
#[derive(Debug, Clone)]
pub struct ReadoutConfig {
    /// Pixel hits accepted per ROC before the decode is aborted
    pub pixel_capacity: usize,
    /// Enable dump output for debugging
    pub dump_enabled: bool,
}

impl Default for ReadoutConfig {
    fn default() -> Self {
        Self {
            pixel_capacity: MAX_PIXELS_PER_ROC,
            dump_enabled: false,
        }
    }
}

/// Decoder bound to a shared, replaceable calibration
#[derive(Debug, Clone)]
pub struct ReadoutDecoder {
    config: ReadoutConfig,
    calibration: CalibrationHandle,
}

impl ReadoutDecoder {
    pub fn new(calibration: CalibrationHandle, config: ReadoutConfig) -> Self {
        Self {
            config,
            calibration,
        }
    }

    pub fn with_defaults(calibration: CalibrationHandle) -> Self {
        Self::new(calibration, ReadoutConfig::default())
    }

    pub fn set_dump_enabled(&mut self, enabled: bool) {
        self.config.dump_enabled = enabled;
    }

    pub fn calibration(&self) -> &CalibrationHandle {
        &self.calibration
    }

    /// Decode one buffer holding the readout of `num_rocs` ROCs
    pub fn decode(&self, buffer: &[AdcWord], num_rocs: usize) -> DecodeResult<DecodedReadoutModule> {
        let calibration = self.calibration.snapshot();
        if self.config.dump_enabled {
            dump_raw_buffer(&calibration, buffer);
        }
        decode_frame(&calibration, buffer, num_rocs, self.config.pixel_capacity)
    }
}

/// Decode one buffer against an explicit calibration
pub fn decode_with(
    calibration: &Calibration,
    buffer: &[AdcWord],
    num_rocs: usize,
) -> DecodeResult<DecodedReadoutModule> {
    decode_frame(calibration, buffer, num_rocs, MAX_PIXELS_PER_ROC)
}

fn decode_frame(
    calibration: &Calibration,
    buffer: &[AdcWord],
    num_rocs: usize,
    pixel_capacity: usize,
) -> DecodeResult<DecodedReadoutModule> {
    if buffer.len() > MAX_BUFFER_LENGTH {
        return Err(DecodeError::BufferTooLong {
            length: buffer.len(),
            max: MAX_BUFFER_LENGTH,
        });
    }
    if num_rocs > MAX_ROCS_PER_MODULE {
        return Err(DecodeError::TooManyRocs {
            requested: num_rocs,
            max: MAX_ROCS_PER_MODULE,
        });
    }
    if calibration.num_rocs() < num_rocs {
        return Err(DecodeError::MissingCalibration {
            roc_id: calibration.num_rocs(),
            available: calibration.num_rocs(),
        });
    }

    let locator = FrameLocator::new(calibration, buffer);
    let addresses = AddressDecoder::new(calibration);
    let mut module = DecodedReadoutModule::new(num_rocs);

    // TBM header
    let header_start = locator.find_tbm_header(0).ok_or(DecodeError::NoHeader)?;
    module
        .tbm
        .raw_header
        .copy_from_slice(&buffer[header_start..header_start + TBM_HEADER_LENGTH]);
    match addresses.decode_tbm_header(&module.tbm.raw_header) {
        Some(counter) => module.tbm.event_counter = counter,
        None => {
            module.failures.tbm_header_invalid = true;
            debug!(position = header_start, "Invalid TBM header data samples");
        }
    }
    let mut position = header_start + TBM_HEADER_LENGTH;

    // ROC sections
    for (roc_id, roc) in module.rocs.iter_mut().enumerate() {
        let Some(roc_start) = locator.find_roc_header(roc_id, position) else {
            module.failures.rocs_without_header += 1;
            debug!(roc_id, position, marker = %FrameMarker::RocHeader, "Frame marker not found");
            continue;
        };
        roc.header_found = true;
        roc.last_dac = buffer[roc_start + ROC_HEADER_LENGTH - 1];
        position = roc_start + ROC_HEADER_LENGTH;

        while position + PIXEL_HIT_LENGTH <= buffer.len() && !locator.is_section_end(roc_id, position)
        {
            let mut raw = [0; PIXEL_HIT_LENGTH];
            raw.copy_from_slice(&buffer[position..position + PIXEL_HIT_LENGTH]);
            position += PIXEL_HIT_LENGTH;

            match addresses.decode_roc_address(roc_id, &raw) {
                Ok(address) => {
                    if roc.pixels.len() >= pixel_capacity {
                        error!(roc_id, capacity = pixel_capacity, "Too many pixel hits on ROC");
                        return Err(DecodeError::CapacityExceeded {
                            roc_id,
                            capacity: pixel_capacity,
                        });
                    }
                    push_pixel(roc, roc_id, address.column, address.row, raw);
                }
                Err(AddressError::InvalidLevel { position: digit, value }) => {
                    module.failures.invalid_address_levels += 1;
                    trace!(roc_id, digit, value, "Pixel dropped: invalid address level");
                }
                Err(AddressError::AddressOutOfRange { column, row }) => {
                    module.failures.addresses_out_of_range += 1;
                    trace!(roc_id, column, row, "Pixel dropped: address out of range");
                }
            }
        }
    }

    // TBM trailer
    match locator.find_tbm_trailer(position) {
        Some(trailer_start) => {
            module
                .tbm
                .raw_trailer
                .copy_from_slice(&buffer[trailer_start..trailer_start + TBM_TRAILER_LENGTH]);
            match addresses.decode_tbm_trailer(&module.tbm.raw_trailer) {
                Some(word) => module.tbm.status = TbmStatus::from_word(word),
                None => {
                    module.failures.tbm_trailer_invalid = true;
                    debug!(position = trailer_start, "Invalid TBM trailer data samples");
                }
            }
        }
        None => {
            module.failures.trailer_missing = true;
            debug!(position, marker = %FrameMarker::TbmTrailer, "Frame marker not found");
        }
    }

    module.num_pixel_hits = module.rocs.iter().map(DecodedReadoutRoc::num_hits).sum();
    Ok(module)
}

fn push_pixel(
    roc: &mut DecodedReadoutRoc,
    roc_id: usize,
    column: i32,
    row: i32,
    raw: [AdcWord; PIXEL_HIT_LENGTH],
) {
    let (column_module, row_module) = to_module_coordinates(roc_id, column, row);
    roc.pixels.push(DecodedReadoutPixel {
        roc_id: roc_id as u8,
        column_roc: column,
        row_roc: row,
        column_module,
        row_module,
        analog_pulse_height: raw[PIXEL_HIT_LENGTH - 1],
        raw,
    });
}

/// Dump a raw buffer with its TBM classification for debugging
pub fn dump_raw_buffer(calibration: &Calibration, buffer: &[AdcWord]) {
    println!("=== Readout Buffer Dump ===");
    println!("Length: {} samples", buffer.len());
    for (i, chunk) in buffer.chunks(8).enumerate().take(32) {
        let line: Vec<String> = chunk
            .iter()
            .map(|&s| {
                let tag = if calibration.tbm.is_ultra_black(s) {
                    "UB"
                } else if calibration.tbm.is_black(s) {
                    "B "
                } else {
                    "  "
                };
                format!("{:6}{}", s, tag)
            })
            .collect();
        println!("{:5}: {}", i * 8, line.join(" "));
    }
    if buffer.len() > 256 {
        println!("... ({} more samples)", buffer.len() - 256);
    }
    println!("=== End Dump ===");
}
