//! Frame marker search over classified samples
//!
//! Markers (UB = ultra-black, B = black):
//! - TBM header:  `UB UB UB B` + 4 event-counter samples
//! - TBM trailer: `UB UB B B` + 4 status samples
//! - ROC header:  `UB B` + last-DAC sample
//!
//! Header and trailer markers use the TBM levels; a ROC header uses that
//! ROC's own levels. A marker only matches when the whole marker (including
//! its data samples) fits in the buffer.

use crate::calibration::{Calibration, RocLevels};
use crate::common::constants::{ROC_HEADER_LENGTH, TBM_HEADER_LENGTH, TBM_TRAILER_LENGTH};
use crate::common::AdcWord;

/// Samples that identify a TBM trailer (the rest is data)
const TBM_TRAILER_MARKER_LENGTH: usize = 4;

/// Marker search over one raw buffer
pub struct FrameLocator<'a> {
    calibration: &'a Calibration,
    buffer: &'a [AdcWord],
}

impl<'a> FrameLocator<'a> {
    pub fn new(calibration: &'a Calibration, buffer: &'a [AdcWord]) -> Self {
        Self {
            calibration,
            buffer,
        }
    }

    /// First TBM header at or after `start`
    pub fn find_tbm_header(&self, start: usize) -> Option<usize> {
        self.scan(start, TBM_HEADER_LENGTH)
            .find(|&i| self.is_tbm_header_at(i))
    }

    /// First TBM trailer at or after `start`
    pub fn find_tbm_trailer(&self, start: usize) -> Option<usize> {
        self.scan(start, TBM_TRAILER_LENGTH)
            .find(|&i| self.is_tbm_trailer_at(i))
    }

    /// First header of ROC `roc_id` at or after `start`
    ///
    /// The search gives up at the start of a TBM trailer: no ROC header
    /// follows the trailer of the frame.
    pub fn find_roc_header(&self, roc_id: usize, start: usize) -> Option<usize> {
        let levels = self.calibration.roc(roc_id)?;
        for i in self.scan(start, ROC_HEADER_LENGTH) {
            if self.starts_tbm_trailer(i) {
                return None;
            }
            if Self::is_roc_header_at(levels, &self.buffer[i..]) {
                return Some(i);
            }
        }
        None
    }

    /// Whether the sample at `position` ends a run of pixel hits
    ///
    /// Hit samples never reach ultra-black, so any ultra-black sample starts
    /// the next ROC header or the TBM trailer.
    pub fn is_section_end(&self, roc_id: usize, position: usize) -> bool {
        let Some(&sample) = self.buffer.get(position) else {
            return true;
        };
        let roc_ultra_black = self
            .calibration
            .roc(roc_id)
            .is_some_and(|levels| levels.is_ultra_black(sample));
        roc_ultra_black || self.calibration.tbm.is_ultra_black(sample)
    }

    pub fn is_tbm_header_at(&self, i: usize) -> bool {
        let tbm = &self.calibration.tbm;
        let b = self.buffer;
        i + TBM_HEADER_LENGTH <= b.len()
            && tbm.is_ultra_black(b[i])
            && tbm.is_ultra_black(b[i + 1])
            && tbm.is_ultra_black(b[i + 2])
            && tbm.is_black(b[i + 3])
    }

    pub fn is_tbm_trailer_at(&self, i: usize) -> bool {
        i + TBM_TRAILER_LENGTH <= self.buffer.len() && self.starts_tbm_trailer(i)
    }

    /// Trailer marker pattern only, even if the data samples are cut off
    fn starts_tbm_trailer(&self, i: usize) -> bool {
        let tbm = &self.calibration.tbm;
        let b = self.buffer;
        i + TBM_TRAILER_MARKER_LENGTH <= b.len()
            && tbm.is_ultra_black(b[i])
            && tbm.is_ultra_black(b[i + 1])
            && tbm.is_black(b[i + 2])
            && tbm.is_black(b[i + 3])
    }

    fn is_roc_header_at(levels: &RocLevels, window: &[AdcWord]) -> bool {
        window.len() >= ROC_HEADER_LENGTH
            && levels.is_ultra_black(window[0])
            && levels.is_black(window[1])
    }

    /// Start positions from `start` where `length` samples still fit
    fn scan(&self, start: usize, length: usize) -> std::ops::Range<usize> {
        let end = (self.buffer.len() + 1).saturating_sub(length);
        start..end.max(start)
    }
}
