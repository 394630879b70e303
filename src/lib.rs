//! Punch power meter.
//!
//! Turns a stream of linear-acceleration samples into a punch score. The
//! [`detector::PunchDetector`] state machine does the measuring; the rest of
//! the crate subscribes to a sample source, drives the detector and reports
//! progress to whatever presents it.

pub mod config;
pub mod detector;
pub mod game;
pub mod report;
pub mod sensor;
#[cfg(unix)]
pub mod socket;

pub use detector::{DetectorConfig, DetectorEvent, MeasurementResult, PunchDetector, Sample};
