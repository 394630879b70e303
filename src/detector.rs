//! Fixed-window punch detector.
//! A punch starts when the squared acceleration magnitude crosses a threshold,
//! then the peak is tracked until the window has elapsed.

use serde::{Deserialize, Serialize};

/// One linear-acceleration reading (gravity removed).
///
/// Components must be finite; the detector does not guard against NaN or
/// infinite values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Monotonic milliseconds.
    pub timestamp_ms: u64,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64, timestamp_ms: u64) -> Self {
        Self { x, y, z, timestamp_ms }
    }

    /// Energy-like power proxy: x² + y² + z². Never negative.
    pub fn magnitude(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Magnitude above which an idle detector starts a session.
    pub start_threshold: f64,
    /// How long the peak is tracked after the session starts.
    pub window_duration_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            start_threshold: 20.0,
            window_duration_ms: 3000,
        }
    }
}

/// What a single call to [`PunchDetector::process_sample`] produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorEvent {
    Idle,
    Started,
    InProgress,
    Completed(MeasurementResult),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementResult {
    pub peak_magnitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSession {
    pub active: bool,
    pub start_timestamp: Option<u64>,
    pub peak_magnitude: f64,
}

impl Default for MeasurementSession {
    fn default() -> Self {
        Self {
            active: false,
            start_timestamp: None,
            peak_magnitude: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PunchDetector {
    config: DetectorConfig,
    session: MeasurementSession,
}

impl PunchDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            session: MeasurementSession::default(),
        }
    }

    /// Replace the configuration. Any running session is dropped.
    pub fn configure(&mut self, config: DetectorConfig) {
        self.config = config;
        self.reset();
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn session(&self) -> &MeasurementSession {
        &self.session
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    pub fn reset(&mut self) {
        self.session = MeasurementSession::default();
    }

    /// Feed one sample. Samples must arrive in non-decreasing timestamp order.
    pub fn process_sample(&mut self, sample: Sample) -> DetectorEvent {
        let magnitude = sample.magnitude();

        let start = match self.session.start_timestamp {
            Some(start) if self.session.active => start,
            _ => {
                if magnitude <= self.config.start_threshold {
                    return DetectorEvent::Idle;
                }
                self.session = MeasurementSession {
                    active: true,
                    start_timestamp: Some(sample.timestamp_ms),
                    peak_magnitude: magnitude,
                };
                return DetectorEvent::Started;
            }
        };

        if magnitude > self.session.peak_magnitude {
            self.session.peak_magnitude = magnitude;
        }

        // Strictly greater: a sample landing exactly on the window edge is still inside it.
        let elapsed = sample.timestamp_ms.saturating_sub(start);
        if elapsed > self.config.window_duration_ms {
            let result = MeasurementResult {
                peak_magnitude: self.session.peak_magnitude,
            };
            self.reset();
            return DetectorEvent::Completed(result);
        }

        DetectorEvent::InProgress
    }
}
