//! # Musical Tuning Module
//!
//! Target tables for the strings being tuned.
//!
//! ## Features
//! - Built-in ukulele tunings (Standard, Baritone, D, Low A, Low G)
//! - Custom tunings loaded from JSON
//! - Cent deviation helper for diagnostics

use log::debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, TunerError};

/// One string to tune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Note name (e.g., "G", "F#")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f64,
    /// Short label shown to the user, the string number for a ukulele
    pub label: String,
    /// Which string this is, in words
    #[serde(default)]
    pub description: String,
}

impl Target {
    fn new(name: &str, frequency: f64, label: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            frequency,
            label: label.to_string(),
            description: description.to_string(),
        }
    }
}

/// An ordered list of targets, tuned one after another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub name: String,
    pub targets: Vec<Target>,
}

const POSITIONS: [(&str, &str); 4] = [
    ("4", "Top most"),
    ("3", "Second from top"),
    ("2", "Second from bottom"),
    ("1", "Bottom most"),
];

fn ukulele(name: &str, notes: [(&str, f64); 4]) -> Tuning {
    let targets = notes
        .iter()
        .zip(POSITIONS)
        .map(|(&(note, freq), (label, description))| Target::new(note, freq, label, description))
        .collect();
    Tuning {
        name: name.to_string(),
        targets,
    }
}

/// Built-in tunings, strings listed top (4) to bottom (1).
///
/// Frequencies are rounded to the nearest Hz.
static PRESETS: Lazy<Vec<Tuning>> = Lazy::new(|| {
    vec![
        ukulele("Standard", [("G", 392.0), ("C", 262.0), ("E", 330.0), ("A", 440.0)]),
        ukulele("Baritone", [("D", 147.0), ("G", 196.0), ("B", 247.0), ("E", 330.0)]),
        ukulele("D-Tuning", [("A", 440.0), ("D", 294.0), ("F#", 370.0), ("B", 494.0)]),
        ukulele("Low A", [("A", 220.0), ("D", 294.0), ("F#", 370.0), ("B", 494.0)]),
        ukulele("Low G", [("G", 196.0), ("C", 262.0), ("E", 330.0), ("A", 440.0)]),
    ]
});

impl Default for Tuning {
    fn default() -> Self {
        PRESETS[0].clone()
    }
}

impl Tuning {
    /// All built-in tunings.
    pub fn presets() -> &'static [Tuning] {
        &PRESETS
    }

    /// Looks up a built-in tuning by name.
    ///
    /// Matching ignores case, spaces, dashes and underscores, so `low-g`,
    /// `Low G` and `LOWG` all select the same table.
    pub fn preset(name: &str) -> Option<Tuning> {
        let wanted = normalize(name);
        PRESETS.iter().find(|t| normalize(&t.name) == wanted).cloned()
    }

    /// Loads and validates a tuning from a JSON file.
    ///
    /// # Arguments
    /// * `path` - File containing a serialized [`Tuning`]
    ///
    /// # Returns
    /// * `Ok(Tuning)` - A tuning with at least one positive target
    /// * `Err(e)` - I/O, parse or validation error
    pub fn load(path: impl AsRef<Path>) -> Result<Tuning> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let tuning = Self::from_json(&data)?;
        debug!("Loaded tuning '{}' from {}", tuning.name, path.display());
        Ok(tuning)
    }

    pub fn from_json(data: &str) -> Result<Tuning> {
        let tuning: Tuning = serde_json::from_str(data)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(TunerError::InvalidConfig(format!(
                "tuning '{}' has no targets",
                self.name
            )));
        }
        if let Some(bad) = self
            .targets
            .iter()
            .find(|t| !(t.frequency.is_finite() && t.frequency > 0.0))
        {
            return Err(TunerError::InvalidConfig(format!(
                "target '{}' has frequency {}",
                bad.name, bad.frequency
            )));
        }
        Ok(())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
///
/// # Arguments
/// * `freq` - Measured frequency in Hz
/// * `target_freq` - Target frequency in Hz
pub fn calculate_cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_standard_gcea() {
        let tuning = Tuning::default();
        let names: Vec<_> = tuning.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["G", "C", "E", "A"]);
        assert_eq!(tuning.targets[0].frequency, 392.0);
        assert_eq!(tuning.targets[0].label, "4");
        assert_eq!(tuning.targets[3].description, "Bottom most");
    }

    #[test]
    fn presets_are_valid() {
        assert_eq!(Tuning::presets().len(), 5);
        for tuning in Tuning::presets() {
            tuning.validate().unwrap();
            assert_eq!(tuning.targets.len(), 4);
        }
    }

    #[test]
    fn preset_lookup_is_forgiving() {
        assert_eq!(Tuning::preset("low-g").unwrap().name, "Low G");
        assert_eq!(Tuning::preset("LOWA").unwrap().targets[0].frequency, 220.0);
        assert_eq!(Tuning::preset("d_tuning").unwrap().name, "D-Tuning");
        assert!(Tuning::preset("banjo").is_none());
    }

    #[test]
    fn json_tuning_loads() {
        let json = r#"{
            "name": "Guitar top",
            "targets": [
                { "name": "E", "frequency": 329.63, "label": "1" },
                { "name": "B", "frequency": 246.94, "label": "2", "description": "Second" }
            ]
        }"#;
        let tuning = Tuning::from_json(json).unwrap();
        assert_eq!(tuning.targets.len(), 2);
        assert_eq!(tuning.targets[0].description, "");
        assert_eq!(tuning.targets[1].description, "Second");
    }

    #[test]
    fn json_tuning_is_validated() {
        let empty = r#"{ "name": "none", "targets": [] }"#;
        assert!(matches!(Tuning::from_json(empty), Err(TunerError::InvalidConfig(_))));

        let negative = r#"{ "name": "bad", "targets": [ { "name": "X", "frequency": -1.0, "label": "1" } ] }"#;
        assert!(matches!(Tuning::from_json(negative), Err(TunerError::InvalidConfig(_))));

        assert!(matches!(Tuning::from_json("{"), Err(TunerError::Json(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Tuning::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, TunerError::Io(_)));
    }

    #[test]
    fn cents_sign_follows_pitch() {
        assert!(calculate_cents_deviation(392.0, 392.0).abs() < 1e-12);
        assert!((calculate_cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-9);
        assert!(calculate_cents_deviation(390.0, 392.0) < 0.0);
    }
}
