//! # Tuning Session
//!
//! Drives one pass over a [`Tuning`]: for every string, frames are read,
//! estimated and filtered until the advance signal fires.
//!
//! ```text
//! SelectString(i) ──> Capture(i) ──(advance)──> SelectString(i + 1)
//!                        │  ^                    or Done after the last
//!                        └──┘ one frame per step
//! ```
//!
//! All mutable state (current target, filter, counters) lives in the
//! [`TuningSession`] value, so each session is independent.

use log::{debug, info};

use crate::audio::FrameSource;
use crate::config::{ResetPolicy, TunerConfig};
use crate::error::Result;
use crate::input::AdvanceSignal;
use crate::pitch::FrequencyEstimator;
use crate::stability::{FilterDecision, StabilityFilter};
use crate::tuning::{Target, Tuning, calculate_cents_deviation};

/// A stable reading handed to the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Frequency of the string being tuned
    pub target_frequency: f64,
    /// Accepted rolling average
    pub average: f64,
    /// `target - average` in Hz; positive when the string is flat
    pub deviation: f64,
    /// Offset of the average from the target in cents; positive when sharp
    pub cents: f64,
}

impl Reading {
    pub fn new(target_frequency: f64, average: f64) -> Self {
        Self {
            target_frequency,
            average,
            deviation: target_frequency - average,
            cents: calculate_cents_deviation(average, target_frequency),
        }
    }
}

/// Receives what the session wants shown.
pub trait DeviationSink {
    /// A new string is being tuned.
    fn begin_target(&mut self, index: usize, target: &Target);

    /// A stable reading for the current string.
    fn show(&mut self, reading: &Reading);

    /// The session is over, successfully or not.
    fn finish(&mut self);
}

impl<K: DeviationSink + ?Sized> DeviationSink for &mut K {
    fn begin_target(&mut self, index: usize, target: &Target) {
        (**self).begin_target(index, target)
    }

    fn show(&mut self, reading: &Reading) {
        (**self).show(reading)
    }

    fn finish(&mut self) {
        (**self).finish()
    }
}

/// Where the session is in its pass over the strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SelectString(usize),
    Capture(usize),
    Done,
}

/// Outcome for one string.
#[derive(Debug, Clone, PartialEq)]
pub struct StringResult {
    pub target: Target,
    /// Last accepted average, if any frame was accepted
    pub last_average: Option<f64>,
}

/// Counters collected over a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub accepted: u64,
    pub held: u64,
    pub strings: Vec<StringResult>,
}

/// One tuning pass over every target of a [`Tuning`].
pub struct TuningSession<S, A, K> {
    source: S,
    advance: A,
    sink: K,
    estimator: FrequencyEstimator,
    filter: StabilityFilter,
    reset_policy: ResetPolicy,
    tuning: Tuning,
    state: SessionState,
    frame: Vec<i16>,
    summary: SessionSummary,
}

impl<S, A, K> TuningSession<S, A, K>
where
    S: FrameSource,
    A: AdvanceSignal,
    K: DeviationSink,
{
    /// Creates a session positioned on the first string.
    ///
    /// # Errors
    /// * [`crate::TunerError::InvalidConfig`] if `config` or `tuning` do not validate
    pub fn new(config: &TunerConfig, tuning: Tuning, source: S, advance: A, sink: K) -> Result<Self> {
        config.validate()?;
        tuning.validate()?;
        Ok(Self {
            source,
            advance,
            sink,
            estimator: FrequencyEstimator::new(config.chunk_size, config.sample_rate),
            filter: StabilityFilter::new(config.sample_size, config.threshold_pct),
            reset_policy: config.reset_policy,
            tuning,
            state: SessionState::SelectString(0),
            frame: vec![0; config.chunk_size],
            summary: SessionSummary::default(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Target of the string currently selected, `None` once done.
    pub fn current_target(&self) -> Option<&Target> {
        match self.state {
            SessionState::SelectString(i) | SessionState::Capture(i) => self.tuning.targets.get(i),
            SessionState::Done => None,
        }
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Performs one transition and returns the new state.
    ///
    /// A capture step blocks on the frame source for one frame.
    pub fn step(&mut self) -> Result<SessionState> {
        self.state = match self.state {
            SessionState::SelectString(i) => self.select_string(i),
            SessionState::Capture(i) => self.capture(i)?,
            SessionState::Done => SessionState::Done,
        };
        Ok(self.state)
    }

    /// Runs every string to completion.
    ///
    /// The sink is always told the session finished. On error the source is
    /// dropped with the session, releasing the device.
    pub fn run(mut self) -> Result<SessionSummary> {
        let outcome = loop {
            match self.step() {
                Ok(SessionState::Done) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        self.sink.finish();
        outcome.map(|()| self.summary)
    }

    fn select_string(&mut self, index: usize) -> SessionState {
        if index == 0 || self.reset_policy == ResetPolicy::PerString {
            self.filter.reset();
        }

        let target = self.tuning.targets[index].clone();
        info!(
            "[SESSION] Tuning {} string (String {}) at {} Hz",
            target.name, target.label, target.frequency
        );
        self.sink.begin_target(index, &target);
        self.advance.rearm();
        self.summary.strings.push(StringResult {
            target,
            last_average: None,
        });
        SessionState::Capture(index)
    }

    fn capture(&mut self, index: usize) -> Result<SessionState> {
        self.source.read_frame(&mut self.frame)?;
        let raw = self.estimator.estimate(&self.frame)?;
        self.summary.frames += 1;

        match self.filter.push(raw) {
            FilterDecision::Accept(average) => {
                self.summary.accepted += 1;
                let reading = Reading::new(self.tuning.targets[index].frequency, average);
                debug!(
                    "[SESSION] raw {:.2} Hz, stable {:.2} Hz, {:+.1} cents",
                    raw, reading.average, reading.cents
                );
                if let Some(result) = self.summary.strings.last_mut() {
                    result.last_average = Some(average);
                }
                self.sink.show(&reading);
            }
            FilterDecision::Hold => {
                self.summary.held += 1;
                debug!("[SESSION] raw {:.2} Hz held", raw);
            }
        }

        if !self.advance.poll() {
            return Ok(SessionState::Capture(index));
        }
        if index + 1 < self.tuning.targets.len() {
            Ok(SessionState::SelectString(index + 1))
        } else {
            info!("[SESSION] Last string done");
            Ok(SessionState::Done)
        }
    }
}
