//! Common types and protocol constants shared across the decoder
//!
//! This module provides:
//! - Protocol constants (marker lengths, chip geometry, capacities)
//! - The raw sample type
//! - Error taxonomy
//! - CLI argument building blocks for the tools

pub mod cli;
pub mod error;

pub use cli::{AutocalArgs, CalibrationArgs, CommonArgs, DecodeArgs, EmulatorArgs};
pub use error::{
    AddressError, ConfigurationError, ConfigurationResult, DecodeError, DecodeResult, FrameMarker,
};

/// One signed ADC word from the testboard
pub type AdcWord = i16;

/// Protocol constants of the analog TBM/ROC readout
pub mod constants {
    /// Maximum number of samples in one triggered readout
    pub const MAX_BUFFER_LENGTH: usize = 4096;

    /// ROCs daisy-chained behind one TBM
    pub const MAX_ROCS_PER_MODULE: usize = 16;

    /// ROC slots in a calibration table
    pub const MAX_CALIBRATED_ROCS: usize = 24;

    /// Pixel hits one ROC section may hold
    pub const MAX_PIXELS_PER_ROC: usize = 1000;

    /// TBM status-level boundaries
    pub const NUM_STATUS_LEVELS: usize = 5;

    /// ROC address-level boundaries
    pub const NUM_ADDRESS_LEVELS: usize = 7;

    // Marker and window lengths (samples)
    pub const TBM_HEADER_LENGTH: usize = 8;
    pub const TBM_TRAILER_LENGTH: usize = 8;
    pub const ROC_HEADER_LENGTH: usize = 3;
    pub const PIXEL_HIT_LENGTH: usize = 6;

    /// Address digits in a pixel hit (the sixth sample is the pulse height)
    pub const ADDRESS_DIGITS_PER_HIT: usize = 5;

    // ROC geometry
    pub const ROC_NUM_COLUMNS: i32 = 52;
    pub const ROC_NUM_ROWS: i32 = 80;

    // Module geometry (2 x 8 ROCs)
    pub const MODULE_NUM_COLUMNS: i32 = 8 * ROC_NUM_COLUMNS;
    pub const MODULE_NUM_ROWS: i32 = 2 * ROC_NUM_ROWS;

    /// Value of every level in an uncalibrated table
    pub const LEVEL_SENTINEL: i32 = -2000;

    /// Lower edge of the auto-calibration ADC range (inclusive)
    pub const ADC_RANGE_MIN: i32 = -2000;

    /// Upper edge of the auto-calibration ADC range (exclusive); also the
    /// fixed top boundary written by the peak finder
    pub const ADC_RANGE_MAX: i32 = 2000;
}
