//! # Deviation Meter
//!
//! A one-line ASCII meter redrawn in place on every stable reading:
//!
//! ```text
//! [.............#......|.....................]
//! ```
//!
//! The `|` marks the target; the `#` sits one column per Hz away from it,
//! left when the string is flat and right when it is sharp.

use std::io::{self, Write};

use uke_core::{DeviationSink, Reading, Target};

const RESET: &str = "\x1b[0m";

/// Colour class of a meter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterColor {
    /// Within tolerance of the target
    InTune,
    /// Below the target by more than the tolerance
    Flat,
    /// Above the target by more than the tolerance
    Sharp,
}

impl MeterColor {
    fn ansi(self) -> &'static str {
        match self {
            MeterColor::InTune => "\x1b[92m", // Green
            MeterColor::Flat => "\x1b[93m",   // Yellow
            MeterColor::Sharp => "\x1b[91m",  // Red
        }
    }
}

/// Lays out one meter row of `width` columns.
///
/// # Arguments
/// * `width` - Row width in columns, at least 5 are used
/// * `deviation` - `target - average` in Hz, positive when flat
/// * `tolerance` - Largest offset still classed as in tune
///
/// # Returns
/// * The row text and its colour class
pub fn render_line(width: usize, deviation: f64, tolerance: usize) -> (String, MeterColor) {
    let width = width.max(5);
    let center = width / 2;

    // Whole Hz only; the marker never reaches the brackets.
    let offset = (deviation.abs().trunc() as usize).min(center - 2);
    let flat = deviation > 0.0;

    let mut line = vec!['.'; width];
    line[0] = '[';
    line[center] = '|';
    line[width - 1] = ']';
    if flat {
        line[center - offset] = '#';
    } else {
        line[center + offset] = '#';
    }

    let color = if offset <= tolerance {
        MeterColor::InTune
    } else if flat {
        MeterColor::Flat
    } else {
        MeterColor::Sharp
    };

    (line.into_iter().collect(), color)
}

/// Draws readings to a terminal-like writer.
///
/// Write errors do not interrupt the session; the first one is kept and can
/// be collected with [`TerminalMeter::take_error`].
pub struct TerminalMeter<W: Write> {
    out: W,
    width: usize,
    tolerance: usize,
    error: Option<io::Error>,
}

impl<W: Write> TerminalMeter<W> {
    pub fn new(out: W, width: usize, tolerance: usize) -> Self {
        Self {
            out,
            width,
            tolerance,
            error: None,
        }
    }

    /// Returns the first write error seen, if any.
    pub fn take_error(&mut self) -> io::Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
    }
}

impl<W: Write> DeviationSink for TerminalMeter<W> {
    fn begin_target(&mut self, _index: usize, target: &Target) {
        let prompt = if target.description.is_empty() {
            format!("{RESET}\nTuning {} string (String {})\n", target.name, target.label)
        } else {
            format!(
                "{RESET}\nTuning {} string (String {}) [{}]\n",
                target.name, target.label, target.description
            )
        };
        self.write(&prompt);
    }

    fn show(&mut self, reading: &Reading) {
        let (line, color) = render_line(self.width, reading.deviation, self.tolerance);
        self.write(&format!("\r{}{}", color.ansi(), line));
    }

    fn finish(&mut self) {
        self.write(&format!("{RESET}\n"));
    }
}
