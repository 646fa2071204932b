//! Runtime configuration for a tuning run.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::audio::{BUFFER_SIZE, RetryPolicy, SAMPLE_RATE};
use crate::error::{Result, TunerError};
use crate::stability::{DEFAULT_SAMPLE_SIZE, DEFAULT_THRESHOLD_PCT};

/// When the stability filter starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// Zero-fill before every string, so each string is judged on its own
    /// frames only.
    #[default]
    PerString,
    /// Zero-fill once at the start of the run and carry the rolling average
    /// across string switches.
    PerSession,
}

/// Settings shared by the capture, analysis and display stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Samples per frame
    pub chunk_size: usize,
    /// Capture rate in Hz
    pub sample_rate: u32,
    /// Raw estimates averaged by the stability filter
    pub sample_size: usize,
    /// Percent rise of the average treated as a transient
    pub threshold_pct: f64,
    pub reset_policy: ResetPolicy,
    pub retry: RetryPolicy,
    /// Longest wait for a frame once capture is running
    pub read_timeout_ms: u64,
    /// Meter columns either side of centre still shown as in tune
    pub in_tune_tolerance: usize,
    /// Seconds per string when there is no keyboard to advance with
    pub auto_advance_secs: f64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            chunk_size: BUFFER_SIZE,
            sample_rate: SAMPLE_RATE,
            sample_size: DEFAULT_SAMPLE_SIZE,
            threshold_pct: DEFAULT_THRESHOLD_PCT,
            reset_policy: ResetPolicy::default(),
            retry: RetryPolicy::default(),
            read_timeout_ms: 2000,
            in_tune_tolerance: 2,
            auto_advance_secs: 8.0,
        }
    }
}

impl TunerConfig {
    /// Reads a config from a JSON file; missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: TunerConfig = serde_json::from_str(&fs::read_to_string(path)?)?;
        debug!("Loaded config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < 4 {
            return Err(TunerError::InvalidConfig(format!(
                "chunk size {} is too small",
                self.chunk_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(TunerError::InvalidConfig("sample rate must be positive".into()));
        }
        if self.sample_size == 0 {
            return Err(TunerError::InvalidConfig("sample size must be at least 1".into()));
        }
        if !(self.threshold_pct.is_finite() && self.threshold_pct >= 0.0) {
            return Err(TunerError::InvalidConfig(format!(
                "threshold {} must be a non-negative percentage",
                self.threshold_pct
            )));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(TunerError::InvalidConfig("max open attempts must be at least 1".into()));
        }
        if !(self.auto_advance_secs.is_finite() && self.auto_advance_secs >= 0.0) {
            return Err(TunerError::InvalidConfig(format!(
                "auto advance {} must be a non-negative number of seconds",
                self.auto_advance_secs
            )));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn auto_advance(&self) -> Duration {
        Duration::from_secs_f64(self.auto_advance_secs)
    }

    /// Duration of one frame, which sets the loop cadence.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.chunk_size as f64 / self.sample_rate as f64)
    }
}
