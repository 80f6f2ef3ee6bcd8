//! Bit-exact Video CD (VCD) disc image assembly.
//!
//! The crate turns MPEG-1 system streams into a raw 2352-byte-per-sector
//! CD-ROM XA image plus a cdrdao table-of-contents descriptor, and can also
//! multiplex a video and an audio elementary stream into the VCD system
//! stream the image builder consumes.

#![warn(missing_docs)]

pub mod bcd;
pub mod builder;
mod edc;
mod ecc;
pub mod image;
pub mod isofs;
pub mod msf;
pub mod mux;
pub mod scanner;
pub mod sector;
pub mod toc;

pub use bcd::Bcd;
pub use builder::{BuildOptions, ImageBuilder};
pub use msf::Msf;

use std::io;
use thiserror::Error;

/// Error type for image-building and multiplexing operations.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum VcdError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported input: {0}")]
    Unsupported(String),
    #[error("unexpected end of input: {0}")]
    Truncated(String),
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
}

/// Convenience type alias for a `Result<R, VcdError>`
pub type VcdResult<R> = std::result::Result<R, VcdError>;

#[test]
fn vcderror_display() {
    // Make sure that VcdError implements Display. This should be true if we
    // set an `#[error("...")]` for every variant
    println!("{}", VcdError::InvalidInput("no pack start code".to_string()));
}
