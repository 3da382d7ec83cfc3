//! `DenoiseError`: unified error type for the public APIs of this crate.
//!
//! All fallible library paths return this type; panicking is reserved for
//! broken internal invariants (debug assertions).

use thiserror::Error;

/// Unified error type for denoiser operations.
#[derive(Debug, Error)]
pub enum DenoiseError {
    /// A transport operation against a peer failed or returned nothing.
    #[error("communication with rank {peer} failed: {reason}")]
    Comm { peer: usize, reason: String },
    /// A message arrived with the wrong byte length.
    #[error("message from rank {peer}: expected {expected} bytes, got {got}")]
    BufferSize {
        peer: usize,
        expected: usize,
        got: usize,
    },
    /// No worker grid tiles the image evenly.
    #[error("image is {rows}x{cols}: no {workers}-worker grid divides it evenly")]
    Topology {
        rows: usize,
        cols: usize,
        workers: usize,
    },
    /// The deployment has a coordinator but no workers.
    #[error("at least one worker rank is required")]
    NoWorkers,
    /// A row of the input image has the wrong number of pixels.
    #[error("input line {line}: expected {expected} pixels, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    /// A pixel token is not an integer.
    #[error("input line {line}: invalid pixel token {token:?}")]
    PixelParse { line: usize, token: String },
    /// A pixel value does not fit the byte-wide wire format.
    #[error("input line {line}: pixel value {value} does not fit in a byte")]
    PixelRange { line: usize, value: i64 },
    /// The input image has no pixels.
    #[error("input image is empty")]
    EmptyImage,
    /// The sub-image payload length does not match the declared shape.
    #[error("sub-image is {rows}x{cols} but carries {len} pixels")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        len: usize,
    },
    /// `beta` must be a finite coupling strength.
    #[error("beta must be finite, got {0}")]
    BadBeta(f64),
    /// `pi` must lie strictly inside (0, 1) for gamma to be defined.
    #[error("pi must lie strictly between 0 and 1, got {0}")]
    BadPi(f64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
