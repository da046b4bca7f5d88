//! Construction errors for the playfield.

use std::collections::TryReserveError;
use thiserror::Error;

/// Largest accepted board side; keeps source indices and cursor maths in range.
pub const MAX_SIDE: usize = 256;

#[derive(Debug, Error)]
pub enum PlayfieldError {
    #[error("invalid playfield size {width}x{height} (each side must be 1..={MAX_SIDE})")]
    InvalidDimensions { width: usize, height: usize },
    #[error("could not allocate playfield storage: {0}")]
    Allocation(#[from] TryReserveError),
}
