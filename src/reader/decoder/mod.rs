//! Decoder module for the analog TBM/ROC readout
//!
//! Converts one raw buffer of ADC samples into a structured
//! [`DecodedReadoutModule`].

pub mod address;
pub mod common;
pub mod frame;
pub mod readout;

pub use address::{
    encode_roc_address, encode_tbm_word, to_module_coordinates, AddressDecoder, PixelAddress,
    RocPlacement, ROC_LAYOUT,
};
pub use common::{
    DecodeFailures, DecodeStatistics, DecodedReadoutModule, DecodedReadoutPixel,
    DecodedReadoutRoc, DecodedReadoutTbm, TbmStatus,
};
pub use frame::FrameLocator;
pub use readout::{decode_with, dump_raw_buffer, ReadoutConfig, ReadoutDecoder};
