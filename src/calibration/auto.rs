//! Auto-calibration from accumulated raw buffers
//!
//! The calibrator is seeded with the current calibration, whose ultra-black
//! and black levels are good enough to locate frames even when the data
//! levels have drifted. Every buffer adds its level-carrying samples to one
//! histogram per channel:
//!
//! - TBM: the black and data samples of the header and trailer
//! - ROC: the black sample of its header and the five address samples of
//!   every hit window
//!
//! [`AutoCalibrator::finish`] runs the peak finder per channel and builds a
//! new calibration. Channels without exactly the expected number of peaks
//! keep their seed levels and are listed in the report.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::peak_finder::{AdcHistogram, PeakFinder, PeakFinderError};
use super::{Calibration, LevelTable};
use crate::common::constants::{
    ADDRESS_DIGITS_PER_HIT, PIXEL_HIT_LENGTH, ROC_HEADER_LENGTH, TBM_HEADER_LENGTH,
    TBM_TRAILER_LENGTH,
};
use crate::common::AdcWord;
use crate::reader::decoder::FrameLocator;

/// First TBM header sample carrying a level (the black after `UB UB UB`)
const TBM_HEADER_LEVEL_OFFSET: usize = 3;

/// First TBM trailer sample carrying a level (the first black after `UB UB`)
const TBM_TRAILER_LEVEL_OFFSET: usize = 2;

/// Calibration channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CalibrationChannel {
    Tbm,
    Roc(usize),
}

impl fmt::Display for CalibrationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationChannel::Tbm => write!(f, "TBM"),
            CalibrationChannel::Roc(id) => write!(f, "ROC {}", id),
        }
    }
}

/// Result of an auto-calibration pass
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    /// New calibration (seed levels kept for failed channels)
    pub calibration: Calibration,
    /// Channels whose peak search failed, with the reason
    pub failed: Vec<(CalibrationChannel, PeakFinderError)>,
    /// Buffers in which a TBM header was found
    pub frames: u64,
}

impl CalibrationReport {
    /// True when every channel was calibrated
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_channels(&self) -> Vec<CalibrationChannel> {
        self.failed.iter().map(|(channel, _)| *channel).collect()
    }
}

/// Per-channel histogram accumulator
#[derive(Debug, Clone)]
pub struct AutoCalibrator {
    seed: Calibration,
    num_rocs: usize,
    tbm: AdcHistogram,
    rocs: Vec<AdcHistogram>,
    buffers: u64,
    frames: u64,
}

impl AutoCalibrator {
    /// Start accumulating for `num_rocs` ROCs (limited to those in `seed`)
    pub fn new(seed: Calibration, num_rocs: usize) -> Self {
        let num_rocs = num_rocs.min(seed.num_rocs());
        Self {
            seed,
            num_rocs,
            tbm: AdcHistogram::new(),
            rocs: vec![AdcHistogram::new(); num_rocs],
            buffers: 0,
            frames: 0,
        }
    }

    pub fn num_rocs(&self) -> usize {
        self.num_rocs
    }

    pub fn buffers(&self) -> u64 {
        self.buffers
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tbm_histogram(&self) -> &AdcHistogram {
        &self.tbm
    }

    pub fn roc_histogram(&self, roc_id: usize) -> Option<&AdcHistogram> {
        self.rocs.get(roc_id)
    }

    /// Add one raw buffer; returns false when no TBM header was found
    pub fn accumulate(&mut self, buffer: &[AdcWord]) -> bool {
        self.buffers += 1;
        let locator = FrameLocator::new(&self.seed, buffer);

        let Some(header) = locator.find_tbm_header(0) else {
            debug!(length = buffer.len(), "No TBM header, buffer skipped");
            return false;
        };
        self.frames += 1;
        for &sample in &buffer[header + TBM_HEADER_LEVEL_OFFSET..header + TBM_HEADER_LENGTH] {
            self.tbm.fill(sample);
        }
        let mut position = header + TBM_HEADER_LENGTH;

        for (roc_id, histogram) in self.rocs.iter_mut().enumerate() {
            let Some(roc_start) = locator.find_roc_header(roc_id, position) else {
                continue;
            };
            histogram.fill(buffer[roc_start + 1]);
            position = roc_start + ROC_HEADER_LENGTH;

            while position + PIXEL_HIT_LENGTH <= buffer.len()
                && !locator.is_section_end(roc_id, position)
            {
                for &sample in &buffer[position..position + ADDRESS_DIGITS_PER_HIT] {
                    histogram.fill(sample);
                }
                position += PIXEL_HIT_LENGTH;
            }
        }

        if let Some(trailer) = locator.find_tbm_trailer(position) {
            for &sample in
                &buffer[trailer + TBM_TRAILER_LEVEL_OFFSET..trailer + TBM_TRAILER_LENGTH]
            {
                self.tbm.fill(sample);
            }
        }
        true
    }

    /// Run the peak finder on every channel and build the new calibration
    pub fn finish(&self) -> CalibrationReport {
        let mut calibration = self.seed.clone();
        let mut failed = Vec::new();

        if let Err(e) = calibrate_table(&PeakFinder::TBM, &self.tbm, &mut calibration.tbm) {
            warn!(error = %e, "TBM auto-calibration failed, keeping seed levels");
            failed.push((CalibrationChannel::Tbm, e));
        }

        let tbm_ultra_black = calibration.tbm.ultra_black();
        for (roc_id, histogram) in self.rocs.iter().enumerate() {
            let Some(levels) = calibration.roc_mut(roc_id) else {
                continue;
            };
            if let Err(e) = calibrate_table(&PeakFinder::ROC, histogram, levels) {
                // Frame headers must stay locatable
                levels.set_ultra_black(tbm_ultra_black);
                warn!(roc_id, error = %e, "ROC auto-calibration failed, keeping seed levels");
                failed.push((CalibrationChannel::Roc(roc_id), e));
            }
        }

        info!(
            frames = self.frames,
            buffers = self.buffers,
            failed = failed.len(),
            "Auto-calibration finished"
        );
        calibration.warn_if_unordered();

        CalibrationReport {
            calibration,
            failed,
            frames: self.frames,
        }
    }

    /// Drop all accumulated samples
    pub fn clear(&mut self) {
        self.tbm.clear();
        self.rocs.iter_mut().for_each(AdcHistogram::clear);
        self.buffers = 0;
        self.frames = 0;
    }
}

/// Replace a table's boundaries with the peak finder's, black at boundary 0
fn calibrate_table<const N: usize>(
    finder: &PeakFinder,
    histogram: &AdcHistogram,
    table: &mut LevelTable<N>,
) -> Result<(), PeakFinderError> {
    let boundaries = finder.calibrate(histogram)?;
    let levels: [i32; N] =
        boundaries
            .as_slice()
            .try_into()
            .map_err(|_| PeakFinderError::TooFewPeaks {
                found: boundaries.len(),
                expected: N,
            })?;
    table.set_black(levels[0]);
    table.set_levels(levels);
    Ok(())
}
