//! Emulator data source - generates synthetic readout buffers for testing
//!
//! The emulator builds a random [`DecodedReadoutModule`] and encodes it into
//! the raw sample stream the module would produce, using the inverse address
//! mapping and a set of nominal analog levels. The calibration matching those
//! levels is available from [`ReadoutEmulator::calibration`], so emulated
//! buffers decode back to the module they were built from.
//!
//! Level samples (markers and digits) can be smeared with Gaussian noise;
//! pulse-height and last-DAC samples are drawn uniformly and never reach
//! ultra-black.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::calibration::{Calibration, RocLevels, TbmLevels};
use crate::common::constants::{
    ADC_RANGE_MAX, MAX_BUFFER_LENGTH, MAX_ROCS_PER_MODULE, PIXEL_HIT_LENGTH, ROC_NUM_COLUMNS,
    ROC_NUM_ROWS,
};
use crate::common::AdcWord;
use crate::reader::decoder::{
    encode_roc_address, encode_tbm_word, to_module_coordinates, DecodedReadoutModule,
    DecodedReadoutPixel, DecodedReadoutRoc, TbmStatus,
};
use crate::reader::{BufferSource, ReaderError, ReaderResult};

/// Nominal analog levels of a freshly biased module
pub mod nominal_levels {
    use crate::common::AdcWord;

    pub const ULTRA_BLACK: AdcWord = -1200;
    pub const BLACK: AdcWord = -700;
    /// TBM data values 0-3
    pub const TBM_DIGITS: [AdcWord; 4] = [-400, 0, 400, 800];
    /// ROC address digits 0-5
    pub const ROC_DIGITS: [AdcWord; 6] = [-450, -250, -50, 150, 350, 550];
}

/// Emulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// RNG seed (random when unset)
    pub seed: Option<u64>,
    /// Number of ROCs behind the TBM
    pub num_rocs: usize,
    /// Maximum hits per ROC; each ROC draws 0..=max uniformly
    pub hits_per_roc: usize,
    /// Gaussian noise on level samples (ADC counts, 0 = none)
    pub noise_sigma: f64,
    /// Black samples before and after the frame
    pub padding: usize,
    /// Pulse-height range (inclusive)
    pub pulse_height_min: AdcWord,
    pub pulse_height_max: AdcWord,
    pub ultra_black: AdcWord,
    pub black: AdcWord,
    pub tbm_levels: [AdcWord; 4],
    pub roc_levels: [AdcWord; 6],
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            num_rocs: MAX_ROCS_PER_MODULE,
            hits_per_roc: 4,
            noise_sigma: 0.0,
            padding: 4,
            pulse_height_min: -400,
            pulse_height_max: 1200,
            ultra_black: nominal_levels::ULTRA_BLACK,
            black: nominal_levels::BLACK,
            tbm_levels: nominal_levels::TBM_DIGITS,
            roc_levels: nominal_levels::ROC_DIGITS,
        }
    }
}

/// Emulator errors
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Invalid noise sigma: {0}")]
    InvalidNoise(#[from] NormalError),

    #[error("Noise sigma must be finite and not negative, got {0}")]
    NegativeNoise(f64),

    #[error("Too many ROCs: {requested} (max {max})")]
    TooManyRocs { requested: usize, max: usize },

    #[error("Pixel ({column}, {row}) on ROC {roc_id} is outside the chip")]
    InvalidPixel { roc_id: usize, column: i32, row: i32 },

    #[error("Pulse height {value} is not above ultra-black {ultra_black}")]
    PulseHeightTooLow { value: AdcWord, ultra_black: AdcWord },

    #[error("Encoded buffer too long: {length} samples (max {max})")]
    BufferTooLong { length: usize, max: usize },
}

/// Synthetic readout generator
pub struct ReadoutEmulator {
    config: EmulatorConfig,
    rng: StdRng,
    noise: Option<Normal<f64>>,
    event_counter: u8,
    buffers_generated: u64,
}

impl ReadoutEmulator {
    /// Create a new emulator with the given configuration
    pub fn new(config: EmulatorConfig) -> Result<Self, EmulatorError> {
        if config.num_rocs > MAX_ROCS_PER_MODULE {
            return Err(EmulatorError::TooManyRocs {
                requested: config.num_rocs,
                max: MAX_ROCS_PER_MODULE,
            });
        }
        if config.pulse_height_min <= config.ultra_black {
            return Err(EmulatorError::PulseHeightTooLow {
                value: config.pulse_height_min,
                ultra_black: config.ultra_black,
            });
        }
        if !(config.noise_sigma >= 0.0 && config.noise_sigma.is_finite()) {
            return Err(EmulatorError::NegativeNoise(config.noise_sigma));
        }
        let noise = if config.noise_sigma != 0.0 {
            Some(Normal::new(0.0, config.noise_sigma)?)
        } else {
            None
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            num_rocs = config.num_rocs,
            hits_per_roc = config.hits_per_roc,
            noise_sigma = config.noise_sigma,
            seed = ?config.seed,
            "Readout emulator created"
        );

        Ok(Self {
            config,
            rng,
            noise,
            event_counter: 0,
            buffers_generated: 0,
        })
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn buffers_generated(&self) -> u64 {
        self.buffers_generated
    }

    /// Calibration with boundaries halfway between the nominal levels
    pub fn calibration(&self) -> Calibration {
        let c = &self.config;
        let ultra_black = midpoint(c.ultra_black, c.black);

        let tbm_black = midpoint(c.black, c.tbm_levels[0]);
        let mut status = [ADC_RANGE_MAX; 5];
        status[0] = tbm_black;
        for i in 1..4 {
            status[i] = midpoint(c.tbm_levels[i - 1], c.tbm_levels[i]);
        }

        let roc_black = midpoint(c.black, c.roc_levels[0]);
        let mut address = [ADC_RANGE_MAX; 7];
        address[0] = roc_black;
        for i in 1..6 {
            address[i] = midpoint(c.roc_levels[i - 1], c.roc_levels[i]);
        }

        Calibration::from_tables(
            TbmLevels::new(ultra_black, tbm_black, status),
            vec![RocLevels::new(ultra_black, roc_black, address); c.num_rocs],
        )
    }

    /// Random module: sequential event counter, clean status, random hits
    pub fn generate_module(&mut self) -> DecodedReadoutModule {
        let mut module = DecodedReadoutModule::new(self.config.num_rocs);
        module.tbm.event_counter = self.event_counter;
        self.event_counter = self.event_counter.wrapping_add(1);

        for (roc_id, roc) in module.rocs.iter_mut().enumerate() {
            roc.header_found = true;
            roc.last_dac = self
                .rng
                .gen_range(self.config.pulse_height_min..=self.config.pulse_height_max);
            let hits = self.rng.gen_range(0..=self.config.hits_per_roc);
            for _ in 0..hits {
                let column = self.rng.gen_range(0..ROC_NUM_COLUMNS);
                let row = self.rng.gen_range(0..ROC_NUM_ROWS);
                let ph = self
                    .rng
                    .gen_range(self.config.pulse_height_min..=self.config.pulse_height_max);
                roc.pixels.push(pixel(roc_id, column, row, ph));
            }
        }
        module.num_pixel_hits = module.rocs.iter().map(DecodedReadoutRoc::num_hits).sum();
        module
    }

    /// Encode a module into a raw buffer
    ///
    /// The raw header, trailer and hit windows of `module` are overwritten
    /// with the samples actually written, noise included.
    pub fn encode(
        &mut self,
        module: &mut DecodedReadoutModule,
    ) -> Result<Vec<AdcWord>, EmulatorError> {
        if module.rocs.len() > MAX_ROCS_PER_MODULE {
            return Err(EmulatorError::TooManyRocs {
                requested: module.rocs.len(),
                max: MAX_ROCS_PER_MODULE,
            });
        }

        let (ub, b) = (self.config.ultra_black, self.config.black);
        let mut buffer = Vec::with_capacity(MAX_BUFFER_LENGTH);
        buffer.extend(std::iter::repeat(b).take(self.config.padding));

        // TBM header
        let start = buffer.len();
        for level in [ub, ub, ub, b] {
            buffer.push(self.smear(level));
        }
        for digit in encode_tbm_word(module.tbm.event_counter) {
            buffer.push(self.smear(self.config.tbm_levels[digit as usize]));
        }
        module.tbm.raw_header.copy_from_slice(&buffer[start..]);

        // ROC sections
        for (roc_id, roc) in module.rocs.iter_mut().enumerate() {
            buffer.push(self.smear(ub));
            buffer.push(self.smear(b));
            buffer.push(roc.last_dac);

            for pixel in roc.pixels.iter_mut() {
                let digits = encode_roc_address(pixel.column_roc, pixel.row_roc).ok_or(
                    EmulatorError::InvalidPixel {
                        roc_id,
                        column: pixel.column_roc,
                        row: pixel.row_roc,
                    },
                )?;
                if pixel.analog_pulse_height <= ub {
                    return Err(EmulatorError::PulseHeightTooLow {
                        value: pixel.analog_pulse_height,
                        ultra_black: ub,
                    });
                }
                let start = buffer.len();
                for digit in digits {
                    buffer.push(self.smear(self.config.roc_levels[digit as usize]));
                }
                buffer.push(pixel.analog_pulse_height);
                pixel.raw.copy_from_slice(&buffer[start..start + PIXEL_HIT_LENGTH]);
            }
        }

        // TBM trailer
        let start = buffer.len();
        for level in [ub, ub, b, b] {
            buffer.push(self.smear(level));
        }
        for digit in encode_tbm_word(module.tbm.status.to_word()) {
            buffer.push(self.smear(self.config.tbm_levels[digit as usize]));
        }
        module.tbm.raw_trailer.copy_from_slice(&buffer[start..]);

        buffer.extend(std::iter::repeat(b).take(self.config.padding));

        if buffer.len() > MAX_BUFFER_LENGTH {
            return Err(EmulatorError::BufferTooLong {
                length: buffer.len(),
                max: MAX_BUFFER_LENGTH,
            });
        }
        self.buffers_generated += 1;
        debug!(
            event = module.tbm.event_counter,
            hits = module.num_pixel_hits,
            length = buffer.len(),
            "Buffer generated"
        );
        Ok(buffer)
    }

    /// Generate a random module together with its raw buffer
    pub fn generate(&mut self) -> Result<(DecodedReadoutModule, Vec<AdcWord>), EmulatorError> {
        let mut module = self.generate_module();
        let buffer = self.encode(&mut module)?;
        Ok((module, buffer))
    }

    fn smear(&mut self, level: AdcWord) -> AdcWord {
        match &self.noise {
            Some(normal) => {
                let value = f64::from(level) + normal.sample(&mut self.rng);
                value.round().clamp(f64::from(AdcWord::MIN), f64::from(AdcWord::MAX)) as AdcWord
            }
            None => level,
        }
    }
}

impl BufferSource for ReadoutEmulator {
    fn next_buffer(&mut self) -> ReaderResult<Option<Vec<AdcWord>>> {
        self.generate()
            .map(|(_, buffer)| Some(buffer))
            .map_err(|e| ReaderError::Source(e.to_string()))
    }
}

fn pixel(roc_id: usize, column: i32, row: i32, ph: AdcWord) -> DecodedReadoutPixel {
    let (column_module, row_module) = to_module_coordinates(roc_id, column, row);
    DecodedReadoutPixel {
        roc_id: roc_id as u8,
        column_roc: column,
        row_roc: row,
        column_module,
        row_module,
        analog_pulse_height: ph,
        raw: [0; PIXEL_HIT_LENGTH],
    }
}

/// Build a module with the given hits `(roc_id, column, row, pulse_height)`
pub fn module_with_hits(
    num_rocs: usize,
    event_counter: u8,
    status: TbmStatus,
    hits: &[(usize, i32, i32, AdcWord)],
) -> DecodedReadoutModule {
    let mut module = DecodedReadoutModule::new(num_rocs);
    module.tbm.event_counter = event_counter;
    module.tbm.status = status;
    for roc in module.rocs.iter_mut() {
        roc.header_found = true;
    }
    for &(roc_id, column, row, ph) in hits {
        if let Some(roc) = module.rocs.get_mut(roc_id) {
            roc.pixels.push(pixel(roc_id, column, row, ph));
        }
    }
    module.num_pixel_hits = module.rocs.iter().map(DecodedReadoutRoc::num_hits).sum();
    module
}

fn midpoint(low: AdcWord, high: AdcWord) -> i32 {
    (i32::from(low) + i32::from(high)) / 2
}
