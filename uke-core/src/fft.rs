//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns a windowed frame into its one-sided power spectrum.
//!
//! ## Features
//! - Forward FFT planned once per frame length using RustFFT
//! - Scratch and output buffers reused across frames
//! - Only the non-negative frequency half (`N/2 + 1` bins) is exposed

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// A planned forward transform of fixed length.
pub struct PowerSpectrum {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    power: Vec<f64>,
}

impl PowerSpectrum {
    /// Plans a transform for frames of `len` samples.
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::default(); len],
            scratch,
            power: vec![0.0; len / 2 + 1],
        }
    }

    /// Frame length this transform was planned for.
    pub fn frame_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of one-sided bins, `⌊N/2⌋ + 1`.
    pub fn bins(&self) -> usize {
        self.power.len()
    }

    /// Computes `|X[k]|²` for `k = 0..=N/2` of a real-valued signal.
    ///
    /// # Arguments
    /// * `signal` - Tapered signal, exactly [`Self::frame_len`] samples
    ///
    /// # Returns
    /// * Squared magnitudes, bin `k` centred on `k * rate / N` Hz
    pub fn compute(&mut self, signal: &[f64]) -> &[f64] {
        debug_assert_eq!(signal.len(), self.buffer.len());

        for (slot, &sample) in self.buffer.iter_mut().zip(signal) {
            *slot = Complex { re: sample, im: 0.0 };
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (p, c) in self.power.iter_mut().zip(&self.buffer) {
            *p = c.norm_sqr();
        }
        &self.power
    }
}

impl std::fmt::Debug for PowerSpectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerSpectrum")
            .field("len", &self.frame_len())
            .field("bins", &self.bins())
            .finish()
    }
}
