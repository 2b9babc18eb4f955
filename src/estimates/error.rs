//! Error types for catalog validation and estimate selection.

use thiserror::Error;

use crate::models::Mode;

/// Result type for estimate operations.
pub type EstimateOutcome<T> = Result<T, EstimateError>;

/// Configuration and input errors raised by the estimate pipeline.
///
/// None of these are meant to be recovered from by picking a fallback string:
/// a caller that sees one has a broken catalog or a programming error.
#[derive(Debug, Error)]
pub enum EstimateError {
    /// A mode string that is not one of the known modes.
    #[error("Unknown estimate mode '{0}'")]
    UnknownMode(String),

    /// A pool reachable by the selection rule has no usable entries.
    #[error("Estimate pool '{tier}' for mode '{mode}' is empty")]
    EmptyPool { mode: Mode, tier: &'static str },

    /// A pool entry that is blank after trimming.
    #[error("Estimate pool '{tier}' for mode '{mode}' contains a blank entry at index {index}")]
    BlankEntry {
        mode: Mode,
        tier: &'static str,
        index: usize,
    },

    /// Intensity outside [0.0, 1.0] or not a finite number.
    #[error("Intensity {0} is outside [0.0, 1.0]")]
    InvalidIntensity(f64),

    /// Failed to read or parse an injected catalog.
    #[error("Failed to load estimate catalog: {0}")]
    Catalog(String),
}
