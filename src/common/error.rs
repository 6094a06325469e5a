//! Error taxonomy for the readout decoder
//!
//! # Design Principles (KISS)
//! - Only configuration problems and stream corruption are returned as errors
//! - Soft failures (missing ROC header, bad pixel address) are counted in the
//!   decoded result instead, so statistical test loops never branch on them
//! - Use thiserror for ergonomic error handling

use thiserror::Error;

/// Which fixed-length marker a frame search was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameMarker {
    TbmHeader,
    TbmTrailer,
    RocHeader,
}

impl std::fmt::Display for FrameMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FrameMarker::TbmHeader => "TBM header",
            FrameMarker::TbmTrailer => "TBM trailer",
            FrameMarker::RocHeader => "ROC header",
        };
        f.write_str(name)
    }
}

/// Calibration file / calibration array errors
///
/// Non-fatal to the process: the caller keeps (or falls back to) a degenerate
/// calibration that classifies nothing as valid.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// I/O error while reading or writing a calibration file
    #[error("Calibration I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File ended before all expected values were read
    #[error("Unexpected end of calibration data while reading {0}")]
    UnexpectedEof(String),

    /// A token could not be parsed as an integer level
    #[error("Invalid calibration token '{token}' while reading {context}")]
    InvalidToken { token: String, context: String },

    /// Format number is not 1, 2 or 3
    #[error("Unknown calibration file format {0} (expected 1, 2 or 3)")]
    UnknownFormat(u8),

    /// More ROCs requested than the calibration table can hold
    #[error("Too many ROCs: {requested} (maximum {max})")]
    TooManyRocs { requested: usize, max: usize },

    /// Explicit arrays have inconsistent lengths
    #[error("Calibration array length mismatch: {0}")]
    LengthMismatch(String),
}

impl ConfigurationError {
    /// Create an unexpected-EOF error
    pub fn eof(context: impl Into<String>) -> Self {
        Self::UnexpectedEof(context.into())
    }

    /// Create an invalid-token error
    pub fn invalid_token(token: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidToken {
            token: token.into(),
            context: context.into(),
        }
    }

    /// Create a length-mismatch error
    pub fn length_mismatch(msg: impl Into<String>) -> Self {
        Self::LengthMismatch(msg.into())
    }
}

/// Per-pixel address decode failure (soft: pixel dropped, counter incremented)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    /// One of the five address samples is not on an address level
    #[error("Address sample {position} (value {value}) is not on an address level")]
    InvalidLevel { position: usize, value: i16 },

    /// Digits decoded, but the resulting pixel is outside the chip
    #[error("Pixel address out of range: column {column}, row {row}")]
    AddressOutOfRange { column: i32, row: i32 },
}

/// Hard decode failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No TBM header in the buffer; nothing can be decoded
    #[error("Frame not found: no TBM header in buffer")]
    NoHeader,

    /// More pixel hits in one ROC section than the result can hold
    #[error("ROC {roc_id}: more than {capacity} pixel hits (stream corruption)")]
    CapacityExceeded { roc_id: usize, capacity: usize },

    /// Buffer longer than one readout can be
    #[error("Buffer too long: {length} samples (maximum {max})")]
    BufferTooLong { length: usize, max: usize },

    /// More ROCs requested than a module carries
    #[error("Too many ROCs requested: {requested} (maximum {max})")]
    TooManyRocs { requested: usize, max: usize },

    /// Calibration does not cover the requested ROC
    #[error("No calibration for ROC {roc_id} ({available} ROCs calibrated)")]
    MissingCalibration { roc_id: usize, available: usize },
}

impl DecodeError {
    /// True for failures that indicate a corrupted stream rather than a missing frame
    pub fn is_corruption(&self) -> bool {
        matches!(self, DecodeError::CapacityExceeded { .. })
    }
}

/// Result type alias for calibration loading
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

/// Result type alias for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;
