//! Raw buffer sources and the readout decoder
//!
//! This module provides:
//! - Readout decoder (decoder)
//! - [`BufferSource`]: where raw buffers come from. The testboard transport
//!   implements it outside this crate; [`TextBufferReader`] reads recorded
//!   buffers from text files and the emulator generates synthetic ones.
//! - Text buffer writer, the inverse of the reader
//!
//! # Text format
//! One buffer per line, whitespace-separated signed ADC words. Blank lines
//! and lines starting with `#` are skipped.

pub mod decoder;

// Re-exports
pub use decoder::{
    decode_with, DecodeFailures, DecodeStatistics, DecodedReadoutModule, DecodedReadoutPixel,
    DecodedReadoutRoc, DecodedReadoutTbm, ReadoutConfig, ReadoutDecoder, TbmStatus,
};

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::common::AdcWord;

/// Reader error type
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: invalid sample '{token}'")]
    InvalidSample { line: usize, token: String },

    #[error("Buffer source error: {0}")]
    Source(String),
}

pub type ReaderResult<T> = Result<T, ReaderError>;

/// Anything that yields raw readout buffers, one triggered readout each
pub trait BufferSource {
    /// Next buffer, or `None` when the source is exhausted
    fn next_buffer(&mut self) -> ReaderResult<Option<Vec<AdcWord>>>;
}

/// Buffer source over a line-oriented text stream
pub struct TextBufferReader<R: BufRead> {
    reader: R,
    line: String,
    line_number: usize,
    buffers_read: u64,
}

impl TextBufferReader<BufReader<File>> {
    /// Open a buffer file
    pub fn open(path: impl AsRef<Path>) -> ReaderResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening buffer file");
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> TextBufferReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
            buffers_read: 0,
        }
    }

    pub fn buffers_read(&self) -> u64 {
        self.buffers_read
    }

    fn parse_line(&self) -> ReaderResult<Vec<AdcWord>> {
        self.line
            .split_whitespace()
            .map(|token| {
                token.parse::<AdcWord>().map_err(|_| ReaderError::InvalidSample {
                    line: self.line_number,
                    token: token.to_string(),
                })
            })
            .collect()
    }
}

impl<R: BufRead> BufferSource for TextBufferReader<R> {
    fn next_buffer(&mut self) -> ReaderResult<Option<Vec<AdcWord>>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                debug!(buffers = self.buffers_read, "End of buffer stream");
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let buffer = self.parse_line()?;
            self.buffers_read += 1;
            return Ok(Some(buffer));
        }
    }
}

impl<R: BufRead> Iterator for TextBufferReader<R> {
    type Item = ReaderResult<Vec<AdcWord>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_buffer().transpose()
    }
}

/// Writes buffers in the text format read by [`TextBufferReader`]
pub struct TextBufferWriter<W: Write> {
    writer: W,
    buffers_written: u64,
}

impl TextBufferWriter<BufWriter<File>> {
    /// Create (truncate) a buffer file
    pub fn create(path: impl AsRef<Path>) -> ReaderResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Creating buffer file");
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> TextBufferWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffers_written: 0,
        }
    }

    /// Write a `#` comment line
    pub fn write_comment(&mut self, comment: &str) -> ReaderResult<()> {
        writeln!(self.writer, "# {}", comment)?;
        Ok(())
    }

    pub fn write_buffer(&mut self, buffer: &[AdcWord]) -> ReaderResult<()> {
        let line: Vec<String> = buffer.iter().map(|s| s.to_string()).collect();
        writeln!(self.writer, "{}", line.join(" "))?;
        self.buffers_written += 1;
        Ok(())
    }

    pub fn buffers_written(&self) -> u64 {
        self.buffers_written
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> ReaderResult<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
