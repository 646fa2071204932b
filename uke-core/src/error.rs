//! Error types for the tuner core.

use thiserror::Error;

/// Errors that can occur while capturing or analysing audio.
#[derive(Error, Debug)]
pub enum TunerError {
    /// No audio input device available
    #[error("No input device available")]
    NoInputDevice,

    /// The device offers no configuration we can capture from
    #[error("No suitable input format found (wanted {sample_rate} Hz)")]
    NoSupportedConfig { sample_rate: u32 },

    /// Failed to query the device
    #[error("Audio device error: {0}")]
    Device(String),

    /// Failed to build the input stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    /// Failed to start the input stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlay(String),

    /// The stream stopped delivering frames for good
    #[error("Audio stream closed")]
    StreamClosed,

    /// No frame arrived within the read timeout
    #[error("Timed out waiting for an audio frame")]
    ReadTimeout,

    /// A frame did not have the configured chunk length
    #[error("Frame has {actual} samples, expected {expected}")]
    FrameLength { expected: usize, actual: usize },

    /// A bounded retry policy ran out of attempts
    #[error("Gave up opening the input device after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<TunerError>,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A tuning or config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A tuning or config file is not valid JSON for its type
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for tuner operations
pub type Result<T> = std::result::Result<T, TunerError>;
