//! Level calibration for the analog TBM/ROC readout
//!
//! The readout encodes frame markers and address digits as quantized voltage
//! levels whose positions drift with bias settings and temperature. A
//! calibration is an ordered table of level *boundaries*, one table for the
//! TBM and one per ROC, against which every raw sample is classified.
//!
//! # Classification
//! - `is_ultra_black(s)`: `s <= ultra_black`
//! - `is_black(s)`: `ultra_black < s <= black`
//! - `classify(s)`: smallest index `i` with `s <= level[i]`, `None` above the top
//!
//! Symbol 0 is the black band; data values start at symbol 1.
//!
//! # Lifecycle
//! Calibrations are built once (file load or auto-calibration) and are never
//! mutated while a decode is running. Replacement goes through
//! [`CalibrationHandle`], which swaps the whole table at once.

pub mod auto;
pub mod handle;
pub mod loader;
pub mod peak_finder;

pub use auto::{AutoCalibrator, CalibrationChannel, CalibrationReport};
pub use handle::CalibrationHandle;
pub use loader::{CalibrationFormat, CalibrationLoader};
pub use peak_finder::{AdcHistogram, Peak, PeakFinder, PeakFinderError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::constants::{
    LEVEL_SENTINEL, MAX_CALIBRATED_ROCS, NUM_ADDRESS_LEVELS, NUM_STATUS_LEVELS,
};
use crate::common::AdcWord;

/// Discrete classification result; 0 is the black band
pub type Symbol = u8;

/// Boundary table for one channel (TBM or ROC)
///
/// `N` is the number of ordered level boundaries: 5 for the TBM status
/// levels, 7 for the ROC address levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTable<const N: usize> {
    ultra_black: i32,
    black: i32,
    #[serde(with = "level_array")]
    levels: [i32; N],
}

/// TBM table: ultra-black, black and 5 status-level boundaries
pub type TbmLevels = LevelTable<NUM_STATUS_LEVELS>;

/// ROC table: ultra-black, black and 7 address-level boundaries
pub type RocLevels = LevelTable<NUM_ADDRESS_LEVELS>;

impl<const N: usize> Default for LevelTable<N> {
    fn default() -> Self {
        Self {
            ultra_black: LEVEL_SENTINEL,
            black: LEVEL_SENTINEL,
            levels: [LEVEL_SENTINEL; N],
        }
    }
}

impl<const N: usize> LevelTable<N> {
    /// Number of level boundaries in this table
    pub const NUM_LEVELS: usize = N;

    /// Build a table from explicit values
    pub fn new(ultra_black: i32, black: i32, levels: [i32; N]) -> Self {
        Self {
            ultra_black,
            black,
            levels,
        }
    }

    pub fn ultra_black(&self) -> i32 {
        self.ultra_black
    }

    pub fn black(&self) -> i32 {
        self.black
    }

    pub fn set_ultra_black(&mut self, value: i32) {
        self.ultra_black = value;
    }

    pub fn set_black(&mut self, value: i32) {
        self.black = value;
    }

    /// All level boundaries, in ascending index order
    pub fn levels(&self) -> &[i32; N] {
        &self.levels
    }

    /// Set boundary `index`; an out-of-range index is logged and ignored
    pub fn set_level(&mut self, index: usize, value: i32) {
        match self.levels.get_mut(index) {
            Some(level) => *level = value,
            None => warn!(index, max = N, value, "Level index out of range, ignored"),
        }
    }

    /// Boundary `index`; an out-of-range index is logged and reads as 0
    pub fn level(&self, index: usize) -> i32 {
        match self.levels.get(index) {
            Some(level) => *level,
            None => {
                warn!(index, max = N, "Level index out of range, returning 0");
                0
            }
        }
    }

    /// Boundary `index`, or `None` when out of range
    pub fn level_checked(&self, index: usize) -> Option<i32> {
        self.levels.get(index).copied()
    }

    /// Replace all boundaries at once
    pub fn set_levels(&mut self, levels: [i32; N]) {
        self.levels = levels;
    }

    #[inline]
    pub fn is_ultra_black(&self, sample: AdcWord) -> bool {
        i32::from(sample) <= self.ultra_black
    }

    #[inline]
    pub fn is_black(&self, sample: AdcWord) -> bool {
        let s = i32::from(sample);
        self.ultra_black < s && s <= self.black
    }

    /// Smallest boundary index `i` with `sample <= level[i]`
    ///
    /// Returns `None` above the top boundary. Total for any table; monotonic
    /// in `sample` whenever the boundaries are strictly increasing.
    #[inline]
    pub fn classify(&self, sample: AdcWord) -> Option<Symbol> {
        let s = i32::from(sample);
        self.levels
            .iter()
            .position(|&level| s <= level)
            .map(|i| i as Symbol)
    }

    /// Whether `ultra_black < black` and `level[0] < level[1] < ...` hold
    pub fn is_strictly_increasing(&self) -> bool {
        self.ultra_black < self.black
            && self.levels.windows(2).all(|pair| pair[0] < pair[1])
    }
}

impl TbmLevels {
    pub fn status_level(&self, index: usize) -> i32 {
        self.level(index)
    }

    pub fn set_status_level(&mut self, index: usize, value: i32) {
        self.set_level(index, value);
    }
}

impl RocLevels {
    pub fn address_level(&self, index: usize) -> i32 {
        self.level(index)
    }

    pub fn set_address_level(&mut self, index: usize, value: i32) {
        self.set_level(index, value);
    }
}

/// Complete level calibration of one module: the TBM plus each ROC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub tbm: TbmLevels,
    rocs: Vec<RocLevels>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Calibration {
    /// Uncalibrated table for `num_rocs` ROCs (clamped to the table capacity)
    ///
    /// Every level is the sentinel. Only a saturated sample at or below it
    /// reads as ultra-black, no sample reads as black, so no frame marker and
    /// no data symbol is ever found.
    /// valid data symbol.
    pub fn new(num_rocs: usize) -> Self {
        let num_rocs = num_rocs.min(MAX_CALIBRATED_ROCS);
        Self {
            tbm: TbmLevels::default(),
            rocs: vec![RocLevels::default(); num_rocs],
        }
    }

    /// Build from already-constructed tables
    pub fn from_tables(tbm: TbmLevels, rocs: Vec<RocLevels>) -> Self {
        Self { tbm, rocs }
    }

    pub fn num_rocs(&self) -> usize {
        self.rocs.len()
    }

    pub fn roc(&self, roc_id: usize) -> Option<&RocLevels> {
        self.rocs.get(roc_id)
    }

    pub fn roc_mut(&mut self, roc_id: usize) -> Option<&mut RocLevels> {
        self.rocs.get_mut(roc_id)
    }

    pub fn rocs(&self) -> &[RocLevels] {
        &self.rocs
    }

    /// True when every table satisfies the ordering invariant
    pub fn is_strictly_increasing(&self) -> bool {
        self.tbm.is_strictly_increasing() && self.rocs.iter().all(|r| r.is_strictly_increasing())
    }

    /// Log every table that violates the ordering invariant
    ///
    /// Legacy calibration files are accepted even when unordered.
    pub fn warn_if_unordered(&self) {
        if !self.tbm.is_strictly_increasing() {
            warn!(levels = ?self.tbm, "TBM levels are not strictly increasing");
        }
        for (roc_id, roc) in self.rocs.iter().enumerate() {
            if !roc.is_strictly_increasing() {
                warn!(roc_id, levels = ?roc, "ROC levels are not strictly increasing");
            }
        }
    }
}

/// serde support for `[i32; N]` with a const-generic length
mod level_array {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        levels: &[i32; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        levels.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[i32; N], D::Error> {
        let values = Vec::<i32>::deserialize(deserializer)?;
        let len = values.len();
        values
            .try_into()
            .map_err(|_| D::Error::invalid_length(len, &"a fixed number of level boundaries"))
    }
}
