//! Round-trip checks for reading DICOM files.
//!
//! A [`SyntheticRecord`] describes a small data set that can be written to disk,
//! [`read_file`] reads it back under a set of [`ReadOptions`]
//! (deferred values, stopping before pixel data, forced reads of headerless files,
//! tag allow-lists) and a [`Verifier`] compares the two.
pub mod error;
pub mod fixtures;
pub mod image_pipeline;
pub mod model;
pub mod utils;
pub mod verify;

pub use error::{ErrorKind, ReadError, SaveError};
pub use image_pipeline::FramePreview;
pub use model::{
    read_file, DeferSize, ReadDataset, ReadOptions, ReadRequest, ScratchFile, SyntheticRecord,
};
pub use verify::{Mismatch, Verifier, VerifyReport};
