//! pixel-readout-rs: level-calibrated decoder for analog pixel-module readout
//!
//! A module's Token Bit Manager (TBM) daisy-chains up to 16 Readout Chips
//! (ROCs) and sends their data as one stream of analog samples. Frame markers
//! and pixel addresses are quantized voltage levels, classified against a
//! runtime calibration.
//!
//! # Modules
//! - [`calibration`]: level tables, file formats, peak finder, auto-calibration
//! - [`reader`]: buffer sources and the readout decoder
//! - [`data_source_emulator`]: synthetic buffers for tests and tools
//! - [`config`]: TOML configuration for the tools
//! - [`common`]: constants, errors, CLI arguments

pub mod calibration;
pub mod common;
pub mod config;
pub mod data_source_emulator;
pub mod reader;
