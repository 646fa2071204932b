//! # Stability Filter
//!
//! Smooths raw per-frame estimates over a rolling window and suppresses the
//! frames where the smoothed value jumps, which is what a pluck or pick noise
//! looks like. The baseline still follows every frame, so a real change of
//! pitch shows up once the window has filled with the new value.

use log::trace;

/// Percent rise of the rolling average above which a frame is held back.
pub const DEFAULT_THRESHOLD_PCT: f64 = 2.0;

/// Number of raw estimates averaged together.
pub const DEFAULT_SAMPLE_SIZE: usize = 8;

/// What the caller should do with the frame just pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterDecision {
    /// Display this average.
    Accept(f64),
    /// Treat the frame as a transient; keep showing the previous value.
    Hold,
}

/// Rolling-average state owned by one tuning session.
#[derive(Debug, Clone)]
pub struct StabilityFilter {
    ring: Vec<f64>,
    cursor: usize,
    last_avg: f64,
    threshold_pct: f64,
}

impl Default for StabilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE, DEFAULT_THRESHOLD_PCT)
    }
}

impl StabilityFilter {
    /// Creates a zero-filled filter averaging `sample_size` estimates.
    ///
    /// A `sample_size` of zero is treated as one.
    pub fn new(sample_size: usize, threshold_pct: f64) -> Self {
        Self {
            ring: vec![0.0; sample_size.max(1)],
            cursor: 0,
            last_avg: 0.0,
            threshold_pct,
        }
    }

    pub fn sample_size(&self) -> usize {
        self.ring.len()
    }

    /// The most recent rolling average, accepted or not.
    pub fn last_average(&self) -> f64 {
        self.last_avg
    }

    /// Zero-fills the ring and clears the baseline.
    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.cursor = 0;
        self.last_avg = 0.0;
    }

    /// Records one raw estimate and decides whether the new average is stable.
    ///
    /// The average is over the whole ring, including slots still zero from a
    /// reset. A zero baseline always holds.
    pub fn push(&mut self, raw: f64) -> FilterDecision {
        self.ring[self.cursor] = raw;
        self.cursor = (self.cursor + 1) % self.ring.len();

        let this_avg = self.ring.iter().sum::<f64>() / self.ring.len() as f64;
        let jumped = if self.last_avg == 0.0 {
            true
        } else {
            let delta_pct = (this_avg - self.last_avg) * 100.0 / self.last_avg;
            delta_pct > self.threshold_pct
        };
        self.last_avg = this_avg;

        trace!("raw {:.2} avg {:.2} jumped {}", raw, this_avg, jumped);
        if jumped {
            FilterDecision::Hold
        } else {
            FilterDecision::Accept(this_avg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled(value: f64) -> StabilityFilter {
        let mut filter = StabilityFilter::default();
        for _ in 0..filter.sample_size() + 1 {
            filter.push(value);
        }
        filter
    }

    #[test]
    fn filling_from_zero_holds_then_accepts() {
        let mut filter = StabilityFilter::default();
        for _ in 0..DEFAULT_SAMPLE_SIZE {
            assert_eq!(filter.push(392.0), FilterDecision::Hold);
        }
        assert_eq!(filter.push(392.0), FilterDecision::Accept(392.0));
        assert_eq!(filter.push(392.0), FilterDecision::Accept(392.0));
    }

    #[test]
    fn single_outlier_holds_at_most_once() {
        let mut filter = settled(392.0);
        let decisions: Vec<_> = std::iter::once(800.0)
            .chain(std::iter::repeat(392.0).take(DEFAULT_SAMPLE_SIZE + 2))
            .map(|raw| filter.push(raw))
            .collect();

        assert_eq!(decisions[0], FilterDecision::Hold);
        assert!(decisions[1..].iter().all(|d| matches!(d, FilterDecision::Accept(_))));
        assert_eq!(*decisions.last().unwrap(), FilterDecision::Accept(392.0));
    }

    #[test]
    fn low_outlier_holds_at_most_once() {
        let mut filter = settled(392.0);
        let holds = std::iter::once(0.0)
            .chain(std::iter::repeat(392.0).take(DEFAULT_SAMPLE_SIZE + 2))
            .map(|raw| filter.push(raw))
            .filter(|d| *d == FilterDecision::Hold)
            .count();
        assert!(holds <= 1);
    }

    #[test]
    fn small_drift_is_accepted() {
        let mut filter = settled(392.0);
        let decision = filter.push(400.0);
        let expected = (392.0 * 7.0 + 400.0) / 8.0;
        assert_eq!(decision, FilterDecision::Accept(expected));
    }

    #[test]
    fn zero_baseline_holds_without_panicking() {
        let mut filter = StabilityFilter::new(4, DEFAULT_THRESHOLD_PCT);
        assert_eq!(filter.last_average(), 0.0);
        assert_eq!(filter.push(0.0), FilterDecision::Hold);
        assert_eq!(filter.push(0.0), FilterDecision::Hold);
        assert_eq!(filter.last_average(), 0.0);
    }

    #[test]
    fn baseline_follows_held_frames() {
        let mut filter = settled(262.0);
        assert_eq!(filter.push(600.0), FilterDecision::Hold);
        let expected = (262.0 * 7.0 + 600.0) / 8.0;
        assert!((filter.last_average() - expected).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_zero_fill() {
        let mut filter = settled(440.0);
        filter.reset();
        assert_eq!(filter.last_average(), 0.0);
        assert_eq!(filter.push(440.0), FilterDecision::Hold);
        assert!((filter.last_average() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn sample_size_of_one_tracks_every_frame() {
        let mut filter = StabilityFilter::new(0, 2.0);
        assert_eq!(filter.sample_size(), 1);
        assert_eq!(filter.push(330.0), FilterDecision::Hold);
        assert_eq!(filter.push(331.0), FilterDecision::Accept(331.0));
        assert_eq!(filter.push(400.0), FilterDecision::Hold);
    }
}
