//! Calibration file loading (three legacy text formats) and dump writing
//!
//! # Formats
//!
//! All formats are whitespace-separated tokens.
//!
//! - **Format 1**: TBM ultra-black, 5 TBM status levels, then per ROC:
//!   ultra-black + 7 address levels. Strict; EOF is an error. Black levels
//!   are not stored and are taken from `level[0]`.
//! - **Format 2**: TBM ultra-black, TBM black, then per ROC 8 integers (a
//!   discarded legacy lower edge followed by the 7 address levels; ROC
//!   ultra-black/black inherited from the TBM). Truncated or `-1`-terminated
//!   ROC data copies ROC 0 to all remaining ROCs and stops. Up to 5 trailing
//!   TBM status levels are optional, and are read even when no ROC is
//!   requested.
//! - **Format 3**: the self-describing dump written by [`CalibrationLoader::write_dump`].
//!
//! # Apply vs. load
//! [`CalibrationLoader::apply`] writes each field into the target as soon as
//! it is parsed, so a truncated file leaves a partially populated table.
//! [`CalibrationLoader::load`] parses into a fresh table and hands it out only
//! on success.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::SplitWhitespace;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Calibration, RocLevels, TbmLevels};
use crate::common::constants::{MAX_CALIBRATED_ROCS, NUM_ADDRESS_LEVELS, NUM_STATUS_LEVELS};
use crate::common::{ConfigurationError, ConfigurationResult};

/// Format 2 per-ROC terminator
const ROC_DATA_SENTINEL: i32 = -1;

/// Format 2 integers per ROC (legacy lower edge + address levels)
const FORMAT2_VALUES_PER_ROC: usize = NUM_ADDRESS_LEVELS + 1;

/// Format 3 layout
mod dump {
    pub const TITLE: &str = "Level calibration dump";
    pub const TITLE_TOKENS: usize = 3;
    pub const SENTINEL: i32 = -2000;
    pub const TBM_LABEL: &str = "TBM levels: UB black status";
    pub const TBM_LABEL_TOKENS: usize = 5;
    pub const ROC_LABEL: &str = "ROC levels: id UB address";
    pub const ROC_LABEL_TOKENS: usize = 5;
    pub const ROC_ROW_LABEL: &str = "ROC";
}

/// Calibration file format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CalibrationFormat {
    /// Format 1: UB + status levels, UB + address levels per ROC
    Plain,
    /// Format 2: shared UB/black, ROC 0 fallback, optional TBM levels
    Compact,
    /// Format 3: self-describing dump
    Dump,
}

impl TryFrom<u8> for CalibrationFormat {
    type Error = ConfigurationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Plain),
            2 => Ok(Self::Compact),
            3 => Ok(Self::Dump),
            other => Err(ConfigurationError::UnknownFormat(other)),
        }
    }
}

impl From<CalibrationFormat> for u8 {
    fn from(format: CalibrationFormat) -> Self {
        match format {
            CalibrationFormat::Plain => 1,
            CalibrationFormat::Compact => 2,
            CalibrationFormat::Dump => 3,
        }
    }
}

impl std::fmt::Display for CalibrationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "format {}", u8::from(*self))
    }
}

/// Whitespace token stream with context-aware errors
struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            inner: content.split_whitespace(),
        }
    }

    fn next_token(&mut self, context: &str) -> ConfigurationResult<&'a str> {
        self.inner
            .next()
            .ok_or_else(|| ConfigurationError::eof(context))
    }

    fn parse(token: &str, context: &str) -> ConfigurationResult<i32> {
        token
            .parse::<i32>()
            .map_err(|_| ConfigurationError::invalid_token(token, context))
    }

    fn next_int(&mut self, context: &str) -> ConfigurationResult<i32> {
        let token = self.next_token(context)?;
        Self::parse(token, context)
    }

    /// Like `next_int`, but EOF is `Ok(None)`
    fn next_int_opt(&mut self, context: &str) -> ConfigurationResult<Option<i32>> {
        match self.inner.next() {
            Some(token) => Self::parse(token, context).map(Some),
            None => Ok(None),
        }
    }

    fn skip(&mut self, count: usize, context: &str) -> ConfigurationResult<()> {
        for _ in 0..count {
            self.next_token(context)?;
        }
        Ok(())
    }
}

/// Builds calibrations from legacy files, explicit arrays, or dumps them
pub struct CalibrationLoader;

impl CalibrationLoader {
    /// Load a calibration file; the result is handed out only on success
    pub fn load_file<P: AsRef<Path>>(
        path: P,
        format: CalibrationFormat,
        num_rocs: usize,
    ) -> ConfigurationResult<Calibration> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let calibration = Self::load(file, format, num_rocs)?;
        info!(
            path = %path.display(),
            %format,
            num_rocs,
            "Loaded level calibration"
        );
        Ok(calibration)
    }

    /// Parse from any reader into a fresh calibration
    pub fn load<R: Read>(
        mut reader: R,
        format: CalibrationFormat,
        num_rocs: usize,
    ) -> ConfigurationResult<Calibration> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::load_str(&content, format, num_rocs)
    }

    /// Parse from a string into a fresh calibration
    pub fn load_str(
        content: &str,
        format: CalibrationFormat,
        num_rocs: usize,
    ) -> ConfigurationResult<Calibration> {
        let mut calibration = Calibration::new(num_rocs);
        Self::apply_str(&mut calibration, content, format, num_rocs)?;
        calibration.warn_if_unordered();
        Ok(calibration)
    }

    /// Apply a file's values to an existing calibration, field by field
    ///
    /// On error the fields parsed so far stay applied.
    pub fn apply<R: Read>(
        calibration: &mut Calibration,
        mut reader: R,
        format: CalibrationFormat,
        num_rocs: usize,
    ) -> ConfigurationResult<()> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::apply_str(calibration, &content, format, num_rocs)
    }

    /// String form of [`CalibrationLoader::apply`]
    pub fn apply_str(
        calibration: &mut Calibration,
        content: &str,
        format: CalibrationFormat,
        num_rocs: usize,
    ) -> ConfigurationResult<()> {
        if num_rocs > MAX_CALIBRATED_ROCS {
            return Err(ConfigurationError::TooManyRocs {
                requested: num_rocs,
                max: MAX_CALIBRATED_ROCS,
            });
        }
        if calibration.rocs.len() < num_rocs {
            calibration.rocs.resize(num_rocs, RocLevels::default());
        }

        let mut tokens = Tokens::new(content);
        match format {
            CalibrationFormat::Plain => Self::apply_plain(calibration, &mut tokens, num_rocs),
            CalibrationFormat::Compact => Self::apply_compact(calibration, &mut tokens, num_rocs),
            CalibrationFormat::Dump => Self::apply_dump(calibration, &mut tokens, num_rocs),
        }
    }

    /// Format 1
    fn apply_plain(
        calibration: &mut Calibration,
        tokens: &mut Tokens<'_>,
        num_rocs: usize,
    ) -> ConfigurationResult<()> {
        let tbm = &mut calibration.tbm;
        tbm.set_ultra_black(tokens.next_int("TBM ultra-black")?);
        for i in 0..NUM_STATUS_LEVELS {
            let value = tokens.next_int(&format!("TBM status level {}", i))?;
            tbm.set_status_level(i, value);
            if i == 0 {
                tbm.set_black(value);
            }
        }

        for roc_id in 0..num_rocs {
            let roc = &mut calibration.rocs[roc_id];
            roc.set_ultra_black(tokens.next_int(&format!("ROC {} ultra-black", roc_id))?);
            for i in 0..NUM_ADDRESS_LEVELS {
                let value = tokens.next_int(&format!("ROC {} address level {}", roc_id, i))?;
                roc.set_address_level(i, value);
                if i == 0 {
                    roc.set_black(value);
                }
            }
        }
        Ok(())
    }

    /// Format 2
    fn apply_compact(
        calibration: &mut Calibration,
        tokens: &mut Tokens<'_>,
        num_rocs: usize,
    ) -> ConfigurationResult<()> {
        calibration
            .tbm
            .set_ultra_black(tokens.next_int("TBM ultra-black")?);
        calibration.tbm.set_black(tokens.next_int("TBM black")?);
        let ultra_black = calibration.tbm.ultra_black();
        let black = calibration.tbm.black();

        // ROC 0 is mandatory: it is the fallback for every other ROC
        if num_rocs > 0 {
            let roc = &mut calibration.rocs[0];
            roc.set_ultra_black(ultra_black);
            roc.set_black(black);
            tokens.next_int("ROC 0 lower edge")?;
            for i in 0..NUM_ADDRESS_LEVELS {
                let value = tokens.next_int(&format!("ROC 0 address level {}", i))?;
                roc.set_address_level(i, value);
            }
        }

        for roc_id in 1..num_rocs {
            if !Self::apply_compact_roc(calibration, tokens, roc_id)? {
                let fallback = calibration.rocs[0];
                warn!(
                    roc_id,
                    num_rocs, "ROC levels truncated, copying ROC 0 levels to remaining ROCs"
                );
                for roc in &mut calibration.rocs[roc_id..num_rocs] {
                    *roc = fallback;
                }
                return Ok(());
            }
        }

        // Optional trailing TBM status levels; missing ones keep their values
        for i in 0..NUM_STATUS_LEVELS {
            match tokens.next_int_opt(&format!("TBM status level {}", i))? {
                Some(value) => calibration.tbm.set_status_level(i, value),
                None => {
                    debug!(read = i, "No further TBM status levels in file");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One format 2 ROC block; `Ok(false)` when the data ends here
    fn apply_compact_roc(
        calibration: &mut Calibration,
        tokens: &mut Tokens<'_>,
        roc_id: usize,
    ) -> ConfigurationResult<bool> {
        let ultra_black = calibration.tbm.ultra_black();
        let black = calibration.tbm.black();

        match tokens.next_int_opt(&format!("ROC {} lower edge", roc_id))? {
            None | Some(ROC_DATA_SENTINEL) => return Ok(false),
            Some(_) => {}
        }

        let roc = &mut calibration.rocs[roc_id];
        roc.set_ultra_black(ultra_black);
        roc.set_black(black);
        for i in 0..FORMAT2_VALUES_PER_ROC - 1 {
            match tokens.next_int_opt(&format!("ROC {} address level {}", roc_id, i))? {
                Some(value) => roc.set_address_level(i, value),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Format 3
    fn apply_dump(
        calibration: &mut Calibration,
        tokens: &mut Tokens<'_>,
        num_rocs: usize,
    ) -> ConfigurationResult<()> {
        tokens.skip(dump::TITLE_TOKENS, "dump title")?;
        let sentinel = tokens.next_int("dump sentinel")?;
        if sentinel != dump::SENTINEL {
            warn!(
                sentinel,
                expected = dump::SENTINEL,
                "Unexpected calibration dump sentinel"
            );
        }
        tokens.skip(dump::TBM_LABEL_TOKENS, "TBM label")?;

        let tbm = &mut calibration.tbm;
        tbm.set_ultra_black(tokens.next_int("TBM ultra-black")?);
        tbm.set_black(tokens.next_int("TBM black")?);
        for i in 0..NUM_STATUS_LEVELS {
            tbm.set_status_level(i, tokens.next_int(&format!("TBM status level {}", i))?);
        }

        tokens.skip(dump::ROC_LABEL_TOKENS, "ROC label")?;
        for roc_id in 0..num_rocs {
            tokens.next_token(&format!("ROC {} label", roc_id))?;
            let index = tokens.next_int(&format!("ROC {} index", roc_id))?;
            if index != roc_id as i32 {
                debug!(roc_id, index, "ROC index in dump differs from position");
            }
            let roc = &mut calibration.rocs[roc_id];
            roc.set_ultra_black(tokens.next_int(&format!("ROC {} ultra-black", roc_id))?);
            roc.set_black(tokens.next_int(&format!("ROC {} black", roc_id))?);
            for i in 0..NUM_ADDRESS_LEVELS {
                let value = tokens.next_int(&format!("ROC {} address level {}", roc_id, i))?;
                roc.set_address_level(i, value);
            }
        }
        Ok(())
    }

    /// Build a calibration from explicit arrays
    ///
    /// The three ROC slices must have equal length (at most 24).
    pub fn from_arrays(
        tbm_ultra_black: i32,
        tbm_black: i32,
        tbm_status: [i32; NUM_STATUS_LEVELS],
        roc_ultra_black: &[i32],
        roc_black: &[i32],
        roc_address: &[[i32; NUM_ADDRESS_LEVELS]],
    ) -> ConfigurationResult<Calibration> {
        let num_rocs = roc_ultra_black.len();
        if roc_black.len() != num_rocs || roc_address.len() != num_rocs {
            return Err(ConfigurationError::length_mismatch(format!(
                "{} ultra-black, {} black, {} address-level rows",
                num_rocs,
                roc_black.len(),
                roc_address.len()
            )));
        }
        if num_rocs > MAX_CALIBRATED_ROCS {
            return Err(ConfigurationError::TooManyRocs {
                requested: num_rocs,
                max: MAX_CALIBRATED_ROCS,
            });
        }

        let tbm = TbmLevels::new(tbm_ultra_black, tbm_black, tbm_status);
        let rocs = roc_ultra_black
            .iter()
            .zip(roc_black)
            .zip(roc_address)
            .map(|((&ub, &black), &levels)| RocLevels::new(ub, black, levels))
            .collect();
        let calibration = Calibration::from_tables(tbm, rocs);
        calibration.warn_if_unordered();
        Ok(calibration)
    }

    /// Write a calibration as a format 3 dump
    pub fn write_dump<W: Write>(calibration: &Calibration, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{}", dump::TITLE)?;
        writeln!(writer, "{}", dump::SENTINEL)?;
        writeln!(writer, "{}", dump::TBM_LABEL)?;

        let tbm = &calibration.tbm;
        write!(writer, "{} {}", tbm.ultra_black(), tbm.black())?;
        for level in tbm.levels() {
            write!(writer, " {}", level)?;
        }
        writeln!(writer)?;

        writeln!(writer, "{}", dump::ROC_LABEL)?;
        for (roc_id, roc) in calibration.rocs().iter().enumerate() {
            write!(
                writer,
                "{} {} {} {}",
                dump::ROC_ROW_LABEL,
                roc_id,
                roc.ultra_black(),
                roc.black()
            )?;
            for level in roc.levels() {
                write!(writer, " {}", level)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Write a format 3 dump to a file
    pub fn save_dump<P: AsRef<Path>>(
        calibration: &Calibration,
        path: P,
    ) -> ConfigurationResult<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        Self::write_dump(calibration, &mut writer)?;
        writer.flush()?;
        info!(
            path = %path.display(),
            num_rocs = calibration.num_rocs(),
            "Saved level calibration dump"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::LEVEL_SENTINEL;

    fn is_unset(level: i32) -> bool {
        level == LEVEL_SENTINEL
    }

    const FORMAT1_TWO_ROCS: &str = "\
-950 -550 -200 200 600 2000
-960 -575 -350 -150 50 250 450 2000
-940 -570 -340 -140 60 260 460 2000
";

    #[test]
    fn test_format_from_u8() {
        assert_eq!(CalibrationFormat::try_from(1).unwrap(), CalibrationFormat::Plain);
        assert_eq!(CalibrationFormat::try_from(3).unwrap(), CalibrationFormat::Dump);
        assert!(matches!(
            CalibrationFormat::try_from(4),
            Err(ConfigurationError::UnknownFormat(4))
        ));
        assert_eq!(u8::from(CalibrationFormat::Compact), 2);
    }

    #[test]
    fn test_plain_format() {
        let cal = CalibrationLoader::load_str(FORMAT1_TWO_ROCS, CalibrationFormat::Plain, 2)
            .unwrap();
        assert_eq!(cal.tbm.ultra_black(), -950);
        assert_eq!(cal.tbm.black(), -550);
        assert_eq!(*cal.tbm.levels(), [-550, -200, 200, 600, 2000]);

        let roc1 = cal.roc(1).unwrap();
        assert_eq!(roc1.ultra_black(), -940);
        assert_eq!(roc1.black(), -570);
        assert_eq!(*roc1.levels(), [-570, -340, -140, 60, 260, 460, 2000]);
        assert!(cal.is_strictly_increasing());
    }

    #[test]
    fn test_plain_format_eof_is_error() {
        let truncated = "-950 -550 -200 200 600 2000\n-960 -575 -350";
        let err = CalibrationLoader::load_str(truncated, CalibrationFormat::Plain, 1).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnexpectedEof(_)));
        assert!(err.to_string().contains("ROC 0 address level 2"));
    }

    #[test]
    fn test_plain_format_apply_is_incremental() {
        let truncated = "-950 -550 -200 200 600 2000\n-960 -575 -350";
        let mut cal = Calibration::new(1);
        let result = CalibrationLoader::apply_str(&mut cal, truncated, CalibrationFormat::Plain, 1);
        assert!(result.is_err());

        // Everything up to the truncation point is applied
        assert_eq!(cal.tbm.ultra_black(), -950);
        assert_eq!(*cal.tbm.levels(), [-550, -200, 200, 600, 2000]);
        let roc = cal.roc(0).unwrap();
        assert_eq!(roc.ultra_black(), -960);
        assert_eq!(roc.address_level(0), -575);
        assert_eq!(roc.address_level(1), -350);
        assert!(is_unset(roc.address_level(2)));
    }

    #[test]
    fn test_invalid_token() {
        let err = CalibrationLoader::load_str("-950 x", CalibrationFormat::Plain, 0).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidToken { .. }));
    }

    #[test]
    fn test_too_many_rocs() {
        let err = CalibrationLoader::load_str("", CalibrationFormat::Plain, 25).unwrap_err();
        assert!(matches!(err, ConfigurationError::TooManyRocs { .. }));
    }

    #[test]
    fn test_compact_full() {
        let content = "\
-950 -550
-2000 -575 -350 -150 50 250 450 2000
-2000 -570 -340 -140 60 260 460 2000
-550 -200 200 600 2000
";
        let cal = CalibrationLoader::load_str(content, CalibrationFormat::Compact, 2).unwrap();
        assert_eq!(cal.tbm.black(), -550);
        assert_eq!(*cal.tbm.levels(), [-550, -200, 200, 600, 2000]);
        let roc1 = cal.roc(1).unwrap();
        assert_eq!(roc1.ultra_black(), -950);
        assert_eq!(roc1.black(), -550);
        assert_eq!(*roc1.levels(), [-570, -340, -140, 60, 260, 460, 2000]);
    }

    #[test]
    fn test_compact_only_roc0_copies_to_all() {
        let content = "-950 -550\n-2000 -575 -350 -150 50 250 450 2000\n";
        let cal = CalibrationLoader::load_str(content, CalibrationFormat::Compact, 16).unwrap();
        let roc0 = *cal.roc(0).unwrap();
        for roc_id in 0..16 {
            assert_eq!(cal.roc(roc_id).unwrap().levels(), roc0.levels());
            assert_eq!(cal.roc(roc_id).unwrap().ultra_black(), -950);
        }
        // Trailing TBM data absent: defaults kept
        assert!(cal.tbm.levels().iter().all(|&l| is_unset(l)));
    }

    #[test]
    fn test_compact_sentinel_terminates() {
        let content = "\
-950 -550
-2000 -575 -350 -150 50 250 450 2000
-2000 -570 -340 -140 60 260 460 2000
-1
-550 -200 200 600 2000
";
        let cal = CalibrationLoader::load_str(content, CalibrationFormat::Compact, 4).unwrap();
        let roc0 = *cal.roc(0).unwrap();
        assert_ne!(cal.roc(1).unwrap(), &roc0);
        assert_eq!(cal.roc(2).unwrap(), &roc0);
        assert_eq!(cal.roc(3).unwrap(), &roc0);
        // Parsing stops at the sentinel, so the TBM levels are not read
        assert!(is_unset(cal.tbm.status_level(0)));
    }

    #[test]
    fn test_compact_partial_roc_overwritten_by_fallback() {
        let content = "-950 -550\n-2000 -575 -350 -150 50 250 450 2000\n-2000 -570 -340";
        let cal = CalibrationLoader::load_str(content, CalibrationFormat::Compact, 3).unwrap();
        assert_eq!(cal.roc(1).unwrap(), cal.roc(0).unwrap());
        assert_eq!(cal.roc(2).unwrap(), cal.roc(0).unwrap());
    }

    #[test]
    fn test_compact_partial_tbm_levels() {
        let content = "-950 -550\n-2000 -575 -350 -150 50 250 450 2000\n-550 -200";
        let cal = CalibrationLoader::load_str(content, CalibrationFormat::Compact, 1).unwrap();
        assert_eq!(cal.tbm.status_level(0), -550);
        assert_eq!(cal.tbm.status_level(1), -200);
        assert!(is_unset(cal.tbm.status_level(2)));
    }

    #[test]
    fn test_compact_without_rocs_reads_tbm_levels() {
        let content = "-950 -550\n-550 -200 200 600 2000\n";
        let cal = CalibrationLoader::load_str(content, CalibrationFormat::Compact, 0).unwrap();
        assert_eq!(cal.num_rocs(), 0);
        assert_eq!(cal.tbm.ultra_black(), -950);
        assert_eq!(*cal.tbm.levels(), [-550, -200, 200, 600, 2000]);
    }

    #[test]
    fn test_compact_missing_roc0_is_error() {
        let err =
            CalibrationLoader::load_str("-950 -550", CalibrationFormat::Compact, 2).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnexpectedEof(_)));
    }

    #[test]
    fn test_dump_roundtrip() {
        let original =
            CalibrationLoader::load_str(FORMAT1_TWO_ROCS, CalibrationFormat::Plain, 2).unwrap();
        let mut buf = Vec::new();
        CalibrationLoader::write_dump(&original, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Level calibration dump\n-2000\n"));

        let back = CalibrationLoader::load_str(&text, CalibrationFormat::Dump, 2).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_dump_labels_match_skip_counts() {
        assert_eq!(dump::TITLE.split_whitespace().count(), dump::TITLE_TOKENS);
        assert_eq!(dump::TBM_LABEL.split_whitespace().count(), dump::TBM_LABEL_TOKENS);
        assert_eq!(dump::ROC_LABEL.split_whitespace().count(), dump::ROC_LABEL_TOKENS);
        assert_eq!(dump::ROC_ROW_LABEL.split_whitespace().count(), 1);
    }

    #[test]
    fn test_dump_roundtrip_many_rocs() {
        let roc = RocLevels::new(-960, -575, [-575, -350, -150, 50, 250, 450, 2000]);
        let mut rocs = vec![roc; 16];
        rocs[9].set_address_level(3, 60);
        let original = Calibration::from_tables(
            TbmLevels::new(-950, -550, [-550, -200, 200, 600, 2000]),
            rocs,
        );
        let mut buf = Vec::new();
        CalibrationLoader::write_dump(&original, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\nROC levels: id UB address\nROC 0 -960 -575 "));

        let back = CalibrationLoader::load_str(&text, CalibrationFormat::Dump, 16).unwrap();
        assert_eq!(back, original);
        assert_eq!(back.roc(9).unwrap().address_level(3), 60);
    }

    #[test]
    fn test_dump_eof_is_error() {
        let content = "Level calibration dump\n-2000\nTBM levels: UB black status\n-950 -550 -550";
        let err = CalibrationLoader::load_str(content, CalibrationFormat::Dump, 1).unwrap_err();
        assert!(err.to_string().contains("TBM status level 1"));
    }

    #[test]
    fn test_from_arrays() {
        let cal = CalibrationLoader::from_arrays(
            -950,
            -550,
            [-550, -200, 200, 600, 2000],
            &[-960, -940],
            &[-575, -570],
            &[
                [-575, -350, -150, 50, 250, 450, 2000],
                [-570, -340, -140, 60, 260, 460, 2000],
            ],
        )
        .unwrap();
        assert_eq!(cal.num_rocs(), 2);
        assert_eq!(cal.roc(1).unwrap().black(), -570);
    }

    #[test]
    fn test_from_arrays_length_mismatch() {
        let err = CalibrationLoader::from_arrays(
            -950,
            -550,
            [-550, -200, 200, 600, 2000],
            &[-960, -940],
            &[-575],
            &[[-575, -350, -150, 50, 250, 450, 2000]; 2],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::LengthMismatch(_)));
    }
}
