//! Level-peak finder for auto-calibration
//!
//! Accumulated raw samples of one channel form well-separated peaks, one per
//! level. The finder walks the histogram bin by bin, alternating between a
//! "zero zone" and "inside a peak":
//!
//! - In a zero zone, a peak starts at a nonzero bin whose forward 10-bin
//!   integral exceeds the integral limit.
//! - Inside a peak, the peak stops at an empty bin whose forward 15-bin
//!   integral is at or below the limit.
//!
//! Boundaries are placed halfway between neighbouring peak means; the last
//! boundary is fixed at the top of the ADC range.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::common::constants::{ADC_RANGE_MAX, ADC_RANGE_MIN};
use crate::common::AdcWord;

/// Forward window used to detect a peak start (bins)
const START_WINDOW: usize = 10;

/// Forward window used to detect a peak stop (bins)
const STOP_WINDOW: usize = 15;

/// Peak finder errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeakFinderError {
    #[error("More than {max} peaks found")]
    TooManyPeaks { max: usize },

    #[error("Found {found} peaks, expected {expected}")]
    TooFewPeaks { found: usize, expected: usize },
}

/// ADC histogram over [-2000, 2000), one bin per ADC count
#[derive(Debug, Clone, Serialize)]
pub struct AdcHistogram {
    pub bins: Vec<u64>,
    pub total_counts: u64,
    pub overflow: u64,
    pub underflow: u64,
}

impl Default for AdcHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl AdcHistogram {
    pub fn new() -> Self {
        Self {
            bins: vec![0u64; (ADC_RANGE_MAX - ADC_RANGE_MIN) as usize],
            total_counts: 0,
            overflow: 0,
            underflow: 0,
        }
    }

    /// Fill the histogram with a raw sample
    pub fn fill(&mut self, sample: AdcWord) {
        self.fill_n(sample, 1);
    }

    /// Fill `count` entries at once
    pub fn fill_n(&mut self, sample: AdcWord, count: u64) {
        self.total_counts += count;

        let value = i32::from(sample);
        if value < ADC_RANGE_MIN {
            self.underflow += count;
            return;
        }
        if value >= ADC_RANGE_MAX {
            self.overflow += count;
            return;
        }

        self.bins[(value - ADC_RANGE_MIN) as usize] += count;
    }

    /// Clear the histogram
    pub fn clear(&mut self) {
        self.bins.fill(0);
        self.total_counts = 0;
        self.overflow = 0;
        self.underflow = 0;
    }

    /// ADC value at the low edge of `bin`
    pub fn bin_value(bin: usize) -> i32 {
        ADC_RANGE_MIN + bin as i32
    }

    /// Sum of `width` bins starting at `bin` (clipped at the end)
    fn integral(&self, bin: usize, width: usize) -> u64 {
        let end = (bin + width).min(self.bins.len());
        self.bins[bin..end].iter().sum()
    }
}

/// One level peak, in ADC units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Peak {
    pub start: i32,
    pub stop: i32,
}

impl Peak {
    /// Midpoint of start and stop (truncating division)
    pub fn mean(&self) -> i32 {
        (self.start + self.stop) / 2
    }
}

/// Peak finder with a channel-specific integral limit and peak cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakFinder {
    integral_limit: u64,
    max_peaks: usize,
}

impl PeakFinder {
    /// TBM channel: black + 4 data levels
    pub const TBM: PeakFinder = PeakFinder {
        integral_limit: 30,
        max_peaks: 5,
    };

    /// ROC channel: black + 6 address levels
    pub const ROC: PeakFinder = PeakFinder {
        integral_limit: 50,
        max_peaks: 7,
    };

    pub fn new(integral_limit: u64, max_peaks: usize) -> Self {
        Self {
            integral_limit,
            max_peaks,
        }
    }

    pub fn max_peaks(&self) -> usize {
        self.max_peaks
    }

    /// Locate all peaks; more than `max_peaks` is an error
    pub fn find_peaks(&self, histogram: &AdcHistogram) -> Result<Vec<Peak>, PeakFinderError> {
        let mut peaks = Vec::with_capacity(self.max_peaks);
        let mut zero_zone = true;
        let mut start_bin = 0usize;

        for (bin, &content) in histogram.bins.iter().enumerate() {
            if zero_zone {
                if content > 0 && histogram.integral(bin, START_WINDOW) > self.integral_limit {
                    start_bin = bin;
                    zero_zone = false;
                }
            } else if content == 0 && histogram.integral(bin, STOP_WINDOW) <= self.integral_limit
            {
                self.push_peak(&mut peaks, start_bin, bin)?;
                zero_zone = true;
            }
        }

        // A peak running into the top of the range closes there
        if !zero_zone {
            self.push_peak(&mut peaks, start_bin, histogram.bins.len())?;
        }

        debug!(
            peaks = peaks.len(),
            limit = self.integral_limit,
            "Peak search finished"
        );
        Ok(peaks)
    }

    fn push_peak(
        &self,
        peaks: &mut Vec<Peak>,
        start_bin: usize,
        stop_bin: usize,
    ) -> Result<(), PeakFinderError> {
        if peaks.len() >= self.max_peaks {
            return Err(PeakFinderError::TooManyPeaks {
                max: self.max_peaks,
            });
        }
        peaks.push(Peak {
            start: AdcHistogram::bin_value(start_bin),
            stop: AdcHistogram::bin_value(stop_bin),
        });
        Ok(())
    }

    /// Boundaries halfway between neighbouring peak means, plus the fixed top
    pub fn boundaries(peaks: &[Peak]) -> Vec<i32> {
        let mut boundaries: Vec<i32> = peaks
            .windows(2)
            .map(|pair| {
                let low = pair[0].mean();
                let high = pair[1].mean();
                low + (high - low) / 2
            })
            .collect();
        if !peaks.is_empty() {
            boundaries.push(ADC_RANGE_MAX);
        }
        boundaries
    }

    /// Find exactly `max_peaks` peaks and return their boundaries
    pub fn calibrate(&self, histogram: &AdcHistogram) -> Result<Vec<i32>, PeakFinderError> {
        let peaks = self.find_peaks(histogram)?;
        if peaks.len() < self.max_peaks {
            return Err(PeakFinderError::TooFewPeaks {
                found: peaks.len(),
                expected: self.max_peaks,
            });
        }
        Ok(Self::boundaries(&peaks))
    }
}
