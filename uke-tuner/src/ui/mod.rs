//! # UI Module
//!
//! Terminal output for the tuner: the start-up banner and the live meter.

pub mod banner;
pub mod meter;
