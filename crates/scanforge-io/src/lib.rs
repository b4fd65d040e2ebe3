#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Dataset directory layout and calibration metadata.
pub mod dataset;

/// Error types for the io module.
pub mod error;

/// PNG image reading and writing.
pub mod png;

pub use crate::error::IoError;
pub use crate::png::{read_image_mono16, read_image_rgb8, write_image_mono16, write_image_rgb8};
