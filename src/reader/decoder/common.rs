//! Common types for decoder module

use serde::{Deserialize, Serialize};

use crate::common::constants::{PIXEL_HIT_LENGTH, TBM_HEADER_LENGTH, TBM_TRAILER_LENGTH};
use crate::common::{AdcWord, DecodeError};

/// One decoded pixel hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedReadoutPixel {
    pub roc_id: u8,
    /// Column on the ROC (0-51)
    pub column_roc: i32,
    /// Row on the ROC (0-79)
    pub row_roc: i32,
    /// Column on the module after the geometry transform (0-415)
    pub column_module: i32,
    /// Row on the module after the geometry transform (0-159)
    pub row_module: i32,
    /// Raw pulse-height sample
    pub analog_pulse_height: AdcWord,
    /// The 6-sample hit window as read from the buffer
    pub raw: [AdcWord; PIXEL_HIT_LENGTH],
}

/// TBM trailer status flags (trailer word bit 7 down to bit 0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TbmStatus {
    pub no_token_pass: bool,
    pub reset_tbm: bool,
    pub reset_roc: bool,
    pub sync_error: bool,
    pub sync_trigger: bool,
    pub clear_trigger_count: bool,
    pub cal_trigger: bool,
    pub stack_full: bool,
}

impl TbmStatus {
    pub fn from_word(word: u8) -> Self {
        let bit = |n: u8| (word >> n) & 0x1 != 0;
        Self {
            no_token_pass: bit(7),
            reset_tbm: bit(6),
            reset_roc: bit(5),
            sync_error: bit(4),
            sync_trigger: bit(3),
            clear_trigger_count: bit(2),
            cal_trigger: bit(1),
            stack_full: bit(0),
        }
    }

    pub fn to_word(&self) -> u8 {
        [
            self.no_token_pass,
            self.reset_tbm,
            self.reset_roc,
            self.sync_error,
            self.sync_trigger,
            self.clear_trigger_count,
            self.cal_trigger,
            self.stack_full,
        ]
        .iter()
        .fold(0u8, |word, &flag| (word << 1) | u8::from(flag))
    }

    /// True if any error flag is raised
    pub fn any(&self) -> bool {
        self.to_word() != 0
    }
}

/// Decoded TBM header and trailer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedReadoutTbm {
    /// 8-bit event counter from the header
    pub event_counter: u8,
    /// Status flags from the trailer
    pub status: TbmStatus,
    /// Raw header samples
    pub raw_header: [AdcWord; TBM_HEADER_LENGTH],
    /// Raw trailer samples (zero when the trailer was not found)
    pub raw_trailer: [AdcWord; TBM_TRAILER_LENGTH],
}

/// Decoded section of one ROC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedReadoutRoc {
    /// Whether the ROC header was located
    pub header_found: bool,
    /// Auxiliary analog value from the ROC header
    pub last_dac: AdcWord,
    /// Pixel hits in readout order
    pub pixels: Vec<DecodedReadoutPixel>,
}

impl DecodedReadoutRoc {
    pub fn num_hits(&self) -> usize {
        self.pixels.len()
    }
}

/// Soft failures met while decoding one buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeFailures {
    /// ROCs whose header was not found
    pub rocs_without_header: u32,
    /// Hit windows with a sample off the address levels
    pub invalid_address_levels: u32,
    /// Hit windows decoding to a pixel outside the chip
    pub addresses_out_of_range: u32,
    /// No TBM trailer after the last ROC section
    pub trailer_missing: bool,
    /// TBM header data samples off the status levels
    pub tbm_header_invalid: bool,
    /// TBM trailer data samples off the status levels
    pub tbm_trailer_invalid: bool,
}

impl DecodeFailures {
    /// Pixels dropped for any reason
    pub fn dropped_pixels(&self) -> u32 {
        self.invalid_address_levels + self.addresses_out_of_range
    }

    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Decoded readout of one module (one trigger)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedReadoutModule {
    pub tbm: DecodedReadoutTbm,
    pub rocs: Vec<DecodedReadoutRoc>,
    pub failures: DecodeFailures,
    /// Total pixel hits over all ROCs
    pub num_pixel_hits: usize,
}

impl DecodedReadoutModule {
    pub fn new(num_rocs: usize) -> Self {
        Self {
            rocs: vec![DecodedReadoutRoc::default(); num_rocs],
            ..Default::default()
        }
    }

    /// All pixel hits, ROC by ROC
    pub fn pixels(&self) -> impl Iterator<Item = &DecodedReadoutPixel> {
        self.rocs.iter().flat_map(|roc| roc.pixels.iter())
    }

    /// Short summary line for display
    pub fn display(&self) -> String {
        format!(
            "Ev:{:3} Hits:{:4} Status:0x{:02x} RocsMissing:{:2} Dropped:{:3}{}",
            self.tbm.event_counter,
            self.num_pixel_hits,
            self.tbm.status.to_word(),
            self.failures.rocs_without_header,
            self.failures.dropped_pixels(),
            if self.failures.trailer_missing {
                " [NO TRAILER]"
            } else {
                ""
            }
        )
    }
}

impl std::fmt::Display for DecodedReadoutModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Caller-side aggregation of decode outcomes over many buffers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStatistics {
    pub buffers: u64,
    pub decoded: u64,
    pub no_header: u64,
    pub capacity_exceeded: u64,
    pub other_errors: u64,
    pub pixel_hits: u64,
    pub rocs_without_header: u64,
    pub dropped_pixels: u64,
    pub trailers_missing: u64,
}

impl DecodeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decode outcome into the counters
    pub fn record(&mut self, result: &Result<DecodedReadoutModule, DecodeError>) {
        self.buffers += 1;
        match result {
            Ok(module) => {
                self.decoded += 1;
                self.pixel_hits += module.num_pixel_hits as u64;
                self.rocs_without_header += u64::from(module.failures.rocs_without_header);
                self.dropped_pixels += u64::from(module.failures.dropped_pixels());
                self.trailers_missing += u64::from(module.failures.trailer_missing);
            }
            Err(DecodeError::NoHeader) => self.no_header += 1,
            Err(DecodeError::CapacityExceeded { .. }) => self.capacity_exceeded += 1,
            Err(_) => self.other_errors += 1,
        }
    }

    /// Fraction of buffers that decoded
    pub fn efficiency(&self) -> f64 {
        if self.buffers == 0 {
            0.0
        } else {
            self.decoded as f64 / self.buffers as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_word_roundtrip_bits() {
        let status = TbmStatus::from_word(0b1000_0001);
        assert!(status.no_token_pass);
        assert!(status.stack_full);
        assert!(!status.sync_error);
        assert_eq!(status.to_word(), 0b1000_0001);
        assert!(status.any());
        assert!(!TbmStatus::default().any());
    }

    #[test]
    fn test_status_single_bits() {
        assert!(TbmStatus::from_word(0x10).sync_error);
        assert!(TbmStatus::from_word(0x02).cal_trigger);
        assert!(TbmStatus::from_word(0x40).reset_tbm);
    }

    #[test]
    fn test_module_new() {
        let module = DecodedReadoutModule::new(4);
        assert_eq!(module.rocs.len(), 4);
        assert!(module.rocs.iter().all(|r| r.num_hits() == 0 && !r.header_found));
        assert!(module.failures.is_clean());
        assert_eq!(module.pixels().count(), 0);
    }

    #[test]
    fn test_failures_dropped() {
        let failures = DecodeFailures {
            invalid_address_levels: 2,
            addresses_out_of_range: 3,
            ..Default::default()
        };
        assert_eq!(failures.dropped_pixels(), 5);
        assert!(!failures.is_clean());
    }

    #[test]
    fn test_statistics_record() {
        let mut stats = DecodeStatistics::new();
        let mut module = DecodedReadoutModule::new(2);
        module.num_pixel_hits = 3;
        module.failures.rocs_without_header = 1;
        module.failures.trailer_missing = true;

        stats.record(&Ok(module));
        stats.record(&Err(DecodeError::NoHeader));
        stats.record(&Err(DecodeError::CapacityExceeded {
            roc_id: 0,
            capacity: 1000,
        }));

        assert_eq!(stats.buffers, 3);
        assert_eq!(stats.decoded, 1);
        assert_eq!(stats.no_header, 1);
        assert_eq!(stats.capacity_exceeded, 1);
        assert_eq!(stats.pixel_hits, 3);
        assert_eq!(stats.rocs_without_header, 1);
        assert_eq!(stats.trailers_missing, 1);
        assert!((stats.efficiency() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        let mut module = DecodedReadoutModule::new(1);
        module.tbm.event_counter = 42;
        module.failures.trailer_missing = true;
        let line = module.to_string();
        assert!(line.contains("Ev: 42"));
        assert!(line.contains("[NO TRAILER]"));
    }
}
