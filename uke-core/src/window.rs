//! # Window Function Module
//!
//! Precomputed tapering weights applied to every audio frame before the
//! transform. A Blackman window is used: its side lobes are low enough that
//! the log-magnitude peak around a plucked string stays close to a parabola,
//! which is what the interpolation in [`crate::pitch`] relies on.

use once_cell::sync::Lazy;
use std::f64::consts::PI;
use std::ops::Deref;

use crate::audio::BUFFER_SIZE;

/// Window table for the default chunk size, computed once per process.
pub static DEFAULT_WINDOW: Lazy<WindowTable> = Lazy::new(|| WindowTable::blackman(BUFFER_SIZE));

/// An immutable sequence of window weights in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTable {
    weights: Box<[f64]>,
}

impl WindowTable {
    /// Builds a Blackman window of `len` points.
    ///
    /// `w[n] = 0.42 - 0.5 cos(2πn/(M-1)) + 0.08 cos(4πn/(M-1))`
    ///
    /// The endpoints evaluate to a rounding error around zero, so every weight
    /// is clamped into `[0, 1]`.
    pub fn blackman(len: usize) -> Self {
        if len == 1 {
            return Self { weights: Box::new([1.0]) };
        }
        let m = (len.max(1) - 1) as f64;
        let weights = (0..len)
            .map(|n| {
                let x = n as f64 / m;
                let w = 0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos();
                w.clamp(0.0, 1.0)
            })
            .collect();
        Self { weights }
    }

    /// Returns the table for `len`, reusing the process-wide one when possible.
    pub fn for_len(len: usize) -> Self {
        if len == BUFFER_SIZE {
            DEFAULT_WINDOW.clone()
        } else {
            Self::blackman(len)
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Deref for WindowTable {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.weights
    }
}
