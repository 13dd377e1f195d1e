//! Engine Error Types

use thiserror::Error;

/// Errors that can occur in the EQ engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Invalid state blob: {0}")]
    InvalidState(String),

    #[error("DSP error: {0}")]
    DspError(#[from] kestrel_dsp::DspError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to spawn analysis thread: {0}")]
    ThreadSpawn(String),

    #[error("Channel send error - receiver dropped")]
    ChannelSendError,

    #[error("Command queue full - analysis thread not keeping up")]
    CommandQueueFull,
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
