//! Engine Error Types

use thiserror::Error;

/// Errors that can occur in the crossover engine
#[derive(Error, Debug, PartialEq)]
pub enum EngineError {
    #[error("Engine configuration error: {0}")]
    ConfigError(String),

    #[error("Command queue full - audio thread is not draining updates")]
    QueueFull,

    #[error("DSP error: {0}")]
    DspError(#[from] xover_dsp::DspError),

    #[error("Snapshot serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
