// uke-core/src/lib.rs

//! The core logic for the console ukulele tuner.
//! This crate is responsible for audio capture, pitch estimation and
//! smoothing of the estimates. It is completely headless
//! and contains no terminal code.

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod input;
pub mod pitch;
pub mod session;
pub mod stability;
pub mod tuning;
pub mod window;

pub use config::{ResetPolicy, TunerConfig};
pub use error::{Result, TunerError};
pub use session::{DeviationSink, Reading, SessionState, SessionSummary, TuningSession};
pub use tuning::{Target, Tuning};
