//! # Pitch Detection Module
//!
//! Single-window spectral peak picking for a plucked string.
//!
//! ## Pipeline
//! 1. Taper the frame with the [`WindowTable`]
//! 2. One-sided power spectrum via [`PowerSpectrum`]
//! 3. Strongest bin, skipping DC
//! 4. Parabolic interpolation of the log power around that bin for
//!    sub-bin accuracy

use log::trace;

use crate::error::{Result, TunerError};
use crate::fft::PowerSpectrum;
use crate::window::WindowTable;

/// Estimates the dominant frequency of fixed-length frames.
///
/// Owns its window table, planned transform and scratch buffer, so a single
/// estimator is reused for every frame of a session without allocating.
#[derive(Debug)]
pub struct FrequencyEstimator {
    window: WindowTable,
    spectrum: PowerSpectrum,
    tapered: Vec<f64>,
    sample_rate: u32,
}

/// Result of picking the strongest bin of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    /// Index of the strongest non-DC bin
    pub bin: usize,
    /// Sub-bin offset from interpolation, `0.0` when it fell back
    pub offset: f64,
    /// Width of one bin in Hz (`rate / N`)
    pub bin_width: f64,
}

impl SpectralPeak {
    /// Interpolated frequency in Hz.
    pub fn frequency(&self) -> f64 {
        (self.bin as f64 + self.offset) * self.bin_width
    }

    /// Frequency of the peak bin centre, without interpolation.
    pub fn bin_frequency(&self) -> f64 {
        self.bin as f64 * self.bin_width
    }
}

impl FrequencyEstimator {
    /// Creates an estimator for frames of `chunk_size` samples at `sample_rate` Hz.
    pub fn new(chunk_size: usize, sample_rate: u32) -> Self {
        Self::with_window(WindowTable::for_len(chunk_size), sample_rate)
    }

    /// Creates an estimator around an existing window table; the frame length
    /// is the table length.
    pub fn with_window(window: WindowTable, sample_rate: u32) -> Self {
        let len = window.len();
        Self {
            spectrum: PowerSpectrum::new(len),
            tapered: vec![0.0; len],
            window,
            sample_rate,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.window.len()
    }

    /// Width of one spectral bin in Hz.
    pub fn bin_width(&self) -> f64 {
        self.sample_rate as f64 / self.chunk_size() as f64
    }

    /// Estimates the dominant frequency of `frame` in Hz.
    ///
    /// The result is always finite and non-negative; degenerate spectra
    /// (silence, clipping into a single bin) fall back to the peak bin centre.
    ///
    /// # Errors
    /// * [`TunerError::FrameLength`] if `frame` is not exactly one chunk long
    pub fn estimate(&mut self, frame: &[i16]) -> Result<f64> {
        Ok(self.analyze(frame)?.frequency())
    }

    /// Locates and refines the spectral peak of `frame`.
    pub fn analyze(&mut self, frame: &[i16]) -> Result<SpectralPeak> {
        if frame.len() != self.chunk_size() {
            return Err(TunerError::FrameLength {
                expected: self.chunk_size(),
                actual: frame.len(),
            });
        }

        for ((out, &sample), &weight) in self.tapered.iter_mut().zip(frame).zip(self.window.iter()) {
            *out = sample as f64 * weight;
        }
        let bin_width = self.bin_width();
        let power = self.spectrum.compute(&self.tapered);

        let bin = peak_bin(power);
        let offset = if bin + 1 < power.len() {
            interpolate_log_parabola(power[bin - 1], power[bin], power[bin + 1]).unwrap_or(0.0)
        } else {
            // No right neighbour to fit against.
            0.0
        };

        let peak = SpectralPeak { bin, offset, bin_width };
        trace!(
            "peak bin {} offset {:+.3} -> {:.2} Hz",
            peak.bin,
            peak.offset,
            peak.frequency()
        );
        Ok(peak)
    }
}

/// Index of the largest value in `power`, searching from bin 1.
///
/// Ties resolve to the lowest index. Returns 1 for a flat spectrum, so the
/// caller always has a left neighbour to interpolate against.
fn peak_bin(power: &[f64]) -> usize {
    let mut best = 1;
    let mut best_power = f64::NEG_INFINITY;
    for (k, &p) in power.iter().enumerate().skip(1) {
        if p > best_power {
            best = k;
            best_power = p;
        }
    }
    best
}

/// Vertex offset of the parabola through `(−1, ln a)`, `(0, ln b)`, `(1, ln c)`.
///
/// # Returns
/// * `Some(offset)` - Offset from the centre bin, within `[-0.5, 0.5]` for a
///   true local maximum
/// * `None` - A log was not finite, the parabola is flat, or the vertex lies
///   outside the three fitted bins (the centre was not a local maximum)
fn interpolate_log_parabola(a: f64, b: f64, c: f64) -> Option<f64> {
    let (y0, y1, y2) = (a.ln(), b.ln(), c.ln());
    if !(y0.is_finite() && y1.is_finite() && y2.is_finite()) {
        return None;
    }

    let denominator = 2.0 * y1 - y2 - y0;
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    let offset = (y2 - y0) * 0.5 / denominator;
    (offset.is_finite() && offset.abs() < 1.0).then_some(offset)
}
