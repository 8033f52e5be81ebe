//! DSP Error Types

use thiserror::Error;

/// Errors that can occur during DSP operations
///
/// Index errors are raised before anything is mutated. Out-of-range
/// parameter values are never errors: they are clamped and accepted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Invalid output channel: {0} (must be 0-3)")]
    InvalidChannel(usize),

    #[error("Invalid input channel: {0} (must be 0-1)")]
    InvalidInputIndex(usize),

    #[error("Invalid band index: {0} (must be 0-4)")]
    InvalidBandIndex(usize),

    #[error("Invalid stereo pair index: {0} (must be 0-1)")]
    InvalidPairIndex(usize),

    #[error("Invalid filter coefficients for frequency {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Sample rate must be between 8000 and 192000 Hz, got {0}")]
    InvalidSampleRate(f32),

    #[error("Config blob has tag {found:?}, expected {expected:?}")]
    BlobTagMismatch { expected: [u8; 4], found: [u8; 4] },

    #[error("Unsupported config blob version {0}")]
    BlobVersion(u8),

    #[error("Malformed config blob: {0}")]
    InvalidBlob(String),
}
