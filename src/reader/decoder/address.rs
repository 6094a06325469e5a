//! Address and TBM word decoding
//!
//! A pixel hit is six samples `c1 c0 r2 r1 r0 ph`. Each address sample is a
//! base-6 digit (ROC symbol minus one):
//!
//! ```text
//! dcol = 6*c1 + c0              double column, 0..=25
//! pix  = 36*r2 + 6*r1 + r0      pixel index inside the double column
//! col  = 2*dcol + pix % 2
//! row  = 80 - pix / 2
//! ```
//!
//! TBM header and trailer carry four 2-bit digits each (TBM symbol minus one),
//! most significant first: the event counter and the status word.

use crate::calibration::{Calibration, LevelTable, RocLevels};
use crate::common::constants::{
    ADDRESS_DIGITS_PER_HIT, MODULE_NUM_COLUMNS, MODULE_NUM_ROWS, PIXEL_HIT_LENGTH,
    ROC_NUM_COLUMNS, ROC_NUM_ROWS, TBM_HEADER_LENGTH, TBM_TRAILER_LENGTH,
};
use crate::common::{AddressError, AdcWord};

mod constants {
    /// Base of one address digit
    pub const ADDRESS_BASE: i32 = 6;
    /// Base of one TBM data digit
    pub const TBM_DIGIT_BASE: u8 = 4;
    /// Number of TBM data digits after each 4-sample marker
    pub const TBM_DATA_DIGITS: usize = 4;
    /// Offset of the first data digit in a TBM header or trailer
    pub const TBM_DATA_OFFSET: usize = 4;
    /// Row reached by pixel index 0, one past the top row
    pub const ROW_ORIGIN: i32 = super::ROC_NUM_ROWS;
}

/// Decoded pixel address on one ROC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelAddress {
    pub column: i32,
    pub row: i32,
}

/// Where a ROC sits on the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RocPlacement {
    pub column_offset: i32,
    pub row_offset: i32,
    /// Rotated by 180 degrees (upper half of the module)
    pub rotated: bool,
}

impl RocPlacement {
    const fn rotated(roc_id: i32) -> Self {
        Self {
            column_offset: MODULE_NUM_COLUMNS - 1 - ROC_NUM_COLUMNS * roc_id,
            row_offset: MODULE_NUM_ROWS - 1,
            rotated: true,
        }
    }

    const fn upright(roc_id: i32) -> Self {
        Self {
            column_offset: ROC_NUM_COLUMNS * (roc_id - 8),
            row_offset: 0,
            rotated: false,
        }
    }

    pub fn apply(&self, column: i32, row: i32) -> (i32, i32) {
        if self.rotated {
            (self.column_offset - column, self.row_offset - row)
        } else {
            (self.column_offset + column, self.row_offset + row)
        }
    }
}

/// Placement of the 16 ROCs: 0-7 along the upper half (rotated), 8-15 along
/// the lower half
pub const ROC_LAYOUT: [RocPlacement; 16] = [
    RocPlacement::rotated(0),
    RocPlacement::rotated(1),
    RocPlacement::rotated(2),
    RocPlacement::rotated(3),
    RocPlacement::rotated(4),
    RocPlacement::rotated(5),
    RocPlacement::rotated(6),
    RocPlacement::rotated(7),
    RocPlacement::upright(8),
    RocPlacement::upright(9),
    RocPlacement::upright(10),
    RocPlacement::upright(11),
    RocPlacement::upright(12),
    RocPlacement::upright(13),
    RocPlacement::upright(14),
    RocPlacement::upright(15),
];

/// Map ROC-local coordinates to module coordinates
///
/// ROC ids past the layout table are returned unchanged.
pub fn to_module_coordinates(roc_id: usize, column: i32, row: i32) -> (i32, i32) {
    match ROC_LAYOUT.get(roc_id) {
        Some(placement) => placement.apply(column, row),
        None => (column, row),
    }
}

/// Address digits (0-5) for a pixel; `None` outside the chip
///
/// Inverse of [`AddressDecoder::decode_roc_address`].
pub fn encode_roc_address(column: i32, row: i32) -> Option<[u8; ADDRESS_DIGITS_PER_HIT]> {
    if !is_on_chip(column, row) {
        return None;
    }
    let base = constants::ADDRESS_BASE;
    let dcol = column / 2;
    let pix = 2 * (constants::ROW_ORIGIN - row) + column % 2;
    Some([
        (dcol / base) as u8,
        (dcol % base) as u8,
        (pix / (base * base)) as u8,
        ((pix / base) % base) as u8,
        (pix % base) as u8,
    ])
}

/// 2-bit digits (0-3) for an 8-bit TBM word, most significant first
pub fn encode_tbm_word(word: u8) -> [u8; 4] {
    [(word >> 6) & 0x3, (word >> 4) & 0x3, (word >> 2) & 0x3, word & 0x3]
}

fn is_on_chip(column: i32, row: i32) -> bool {
    (0..ROC_NUM_COLUMNS).contains(&column) && (0..ROC_NUM_ROWS).contains(&row)
}

/// Classify a data sample into a digit; symbol 0 (black) is not data
fn digit<const N: usize>(levels: &LevelTable<N>, sample: AdcWord) -> Option<u8> {
    match levels.classify(sample) {
        Some(symbol) if symbol > 0 => Some(symbol - 1),
        _ => None,
    }
}

/// Decoder of address and TBM data samples against one calibration
pub struct AddressDecoder<'a> {
    calibration: &'a Calibration,
}

impl<'a> AddressDecoder<'a> {
    pub fn new(calibration: &'a Calibration) -> Self {
        Self { calibration }
    }

    /// Decode the five address samples of a hit window into a ROC pixel
    pub fn decode_roc_address(
        &self,
        roc_id: usize,
        raw: &[AdcWord; PIXEL_HIT_LENGTH],
    ) -> Result<PixelAddress, AddressError> {
        let uncalibrated = RocLevels::default();
        let levels = self.calibration.roc(roc_id).unwrap_or(&uncalibrated);

        let mut digits = [0i32; ADDRESS_DIGITS_PER_HIT];
        for (position, (slot, &sample)) in digits.iter_mut().zip(raw.iter()).enumerate() {
            *slot = i32::from(digit(levels, sample).ok_or(AddressError::InvalidLevel {
                position,
                value: sample,
            })?);
        }

        let base = constants::ADDRESS_BASE;
        let [c1, c0, r2, r1, r0] = digits;
        let dcol = base * c1 + c0;
        let pix = base * base * r2 + base * r1 + r0;
        let column = 2 * dcol + pix % 2;
        let row = constants::ROW_ORIGIN - pix / 2;

        if !is_on_chip(column, row) {
            return Err(AddressError::AddressOutOfRange { column, row });
        }
        Ok(PixelAddress { column, row })
    }

    /// Event counter from a TBM header; `None` if a data sample is invalid
    pub fn decode_tbm_header(&self, raw: &[AdcWord; TBM_HEADER_LENGTH]) -> Option<u8> {
        self.decode_tbm_word(&raw[constants::TBM_DATA_OFFSET..])
    }

    /// Status word from a TBM trailer; `None` if a data sample is invalid
    pub fn decode_tbm_trailer(&self, raw: &[AdcWord; TBM_TRAILER_LENGTH]) -> Option<u8> {
        self.decode_tbm_word(&raw[constants::TBM_DATA_OFFSET..])
    }

    fn decode_tbm_word(&self, samples: &[AdcWord]) -> Option<u8> {
        samples
            .iter()
            .take(constants::TBM_DATA_DIGITS)
            .try_fold(0u8, |word, &sample| {
                let d = digit(&self.calibration.tbm, sample)?;
                (d < constants::TBM_DIGIT_BASE).then(|| (word << 2) | d)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::TbmLevels;

    const UB: AdcWord = -1200;
    const B: AdcWord = -700;
    const TBM_DIGITS: [AdcWord; 4] = [-400, 0, 400, 800];
    const ROC_DIGITS: [AdcWord; 6] = [-450, -250, -50, 150, 350, 550];

    fn calibration() -> Calibration {
        let tbm = TbmLevels::new(-950, -550, [-550, -200, 200, 600, 2000]);
        let roc = RocLevels::new(-950, -575, [-575, -350, -150, 50, 250, 450, 2000]);
        Calibration::from_tables(tbm, vec![roc; 16])
    }

    fn hit_window(column: i32, row: i32, ph: AdcWord) -> [AdcWord; PIXEL_HIT_LENGTH] {
        let digits = encode_roc_address(column, row).unwrap();
        let mut raw = [ph; PIXEL_HIT_LENGTH];
        for (slot, d) in raw.iter_mut().zip(digits) {
            *slot = ROC_DIGITS[d as usize];
        }
        raw
    }

    #[test]
    fn test_decode_known_address() {
        let cal = calibration();
        let decoder = AddressDecoder::new(&cal);
        // c1=0 c0=0 r2=0 r1=0 r0=0 -> dcol 0, pix 0 -> col 0, row 80: off chip
        let raw = [ROC_DIGITS[0], ROC_DIGITS[0], ROC_DIGITS[0], ROC_DIGITS[0], ROC_DIGITS[0], 0];
        assert_eq!(
            decoder.decode_roc_address(0, &raw),
            Err(AddressError::AddressOutOfRange { column: 0, row: 80 })
        );

        // r0=2 -> pix 2 -> col 0, row 79
        let raw = [ROC_DIGITS[0], ROC_DIGITS[0], ROC_DIGITS[0], ROC_DIGITS[0], ROC_DIGITS[2], 0];
        assert_eq!(
            decoder.decode_roc_address(0, &raw),
            Ok(PixelAddress { column: 0, row: 79 })
        );
    }

    #[test]
    fn test_encode_decode_all_pixels() {
        let cal = calibration();
        let decoder = AddressDecoder::new(&cal);
        for column in 0..52 {
            for row in 0..80 {
                let raw = hit_window(column, row, 100);
                assert_eq!(
                    decoder.decode_roc_address(3, &raw),
                    Ok(PixelAddress { column, row }),
                    "col {} row {}",
                    column,
                    row
                );
            }
        }
    }

    #[test]
    fn test_encode_off_chip() {
        assert_eq!(encode_roc_address(52, 0), None);
        assert_eq!(encode_roc_address(0, 80), None);
        assert_eq!(encode_roc_address(-1, 10), None);
    }

    #[test]
    fn test_black_digit_is_invalid_level() {
        let cal = calibration();
        let decoder = AddressDecoder::new(&cal);
        let mut raw = hit_window(10, 10, 0);
        raw[2] = B;
        assert_eq!(
            decoder.decode_roc_address(0, &raw),
            Err(AddressError::InvalidLevel {
                position: 2,
                value: B
            })
        );
    }

    #[test]
    fn test_above_top_level_is_invalid() {
        let tbm = TbmLevels::new(-950, -550, [-550, -200, 200, 600, 2000]);
        let roc = RocLevels::new(-950, -575, [-575, -350, -150, 50, 250, 450, 500]);
        let cal = Calibration::from_tables(tbm, vec![roc]);
        let decoder = AddressDecoder::new(&cal);
        let mut raw = hit_window(10, 10, 0);
        raw[0] = 900;
        assert!(matches!(
            decoder.decode_roc_address(0, &raw),
            Err(AddressError::InvalidLevel { position: 0, .. })
        ));
    }

    #[test]
    fn test_uncalibrated_roc_is_invalid() {
        let cal = calibration();
        let decoder = AddressDecoder::new(&cal);
        let raw = hit_window(1, 1, 0);
        assert!(matches!(
            decoder.decode_roc_address(20, &raw),
            Err(AddressError::InvalidLevel { position: 0, .. })
        ));
    }

    #[test]
    fn test_decode_tbm_words() {
        let cal = calibration();
        let decoder = AddressDecoder::new(&cal);
        for word in [0u8, 1, 0x5a, 0xa5, 0xff] {
            let mut header = [UB, UB, UB, B, 0, 0, 0, 0];
            let mut trailer = [UB, UB, B, B, 0, 0, 0, 0];
            for (i, d) in encode_tbm_word(word).iter().enumerate() {
                header[4 + i] = TBM_DIGITS[*d as usize];
                trailer[4 + i] = TBM_DIGITS[*d as usize];
            }
            assert_eq!(decoder.decode_tbm_header(&header), Some(word));
            assert_eq!(decoder.decode_tbm_trailer(&trailer), Some(word));
        }
    }

    #[test]
    fn test_decode_tbm_invalid_digit() {
        let cal = calibration();
        let decoder = AddressDecoder::new(&cal);
        let header = [UB, UB, UB, B, TBM_DIGITS[0], B, TBM_DIGITS[1], TBM_DIGITS[2]];
        assert_eq!(decoder.decode_tbm_header(&header), None);
    }

    #[test]
    fn test_module_geometry() {
        assert_eq!(to_module_coordinates(0, 0, 0), (415, 159));
        assert_eq!(to_module_coordinates(0, 51, 79), (364, 80));
        assert_eq!(to_module_coordinates(7, 51, 0), (0, 159));
        assert_eq!(to_module_coordinates(8, 0, 0), (0, 0));
        assert_eq!(to_module_coordinates(15, 51, 79), (415, 79));
        assert_eq!(to_module_coordinates(16, 3, 4), (3, 4));
    }

    #[test]
    fn test_module_geometry_covers_module_once() {
        let mut seen = vec![false; 416 * 160];
        for roc_id in 0..16 {
            for column in 0..52 {
                for row in 0..80 {
                    let (c, r) = to_module_coordinates(roc_id, column, row);
                    assert!((0..416).contains(&c) && (0..160).contains(&r));
                    let index = (r * 416 + c) as usize;
                    assert!(!seen[index], "pixel mapped twice");
                    seen[index] = true;
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }
}
