//! Reporting interface between the measurement round and whatever presents it.

use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STATUS_READY: &str = "Hold the device and throw a punch";
pub const STATUS_MEASURING: &str = "Measuring punch power";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Multiplier applied to the peak magnitude for display.
    pub score_scale: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { score_scale: 100.0 }
    }
}

/// Display score derived from a peak magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(pub f64);

impl Score {
    pub fn from_peak(peak_magnitude: f64, display: &DisplayConfig) -> Self {
        Score(peak_magnitude * display.score_scale)
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Halves round away from zero; `{:.0}` alone would round them to even
        write!(f, "{:.0} points", self.0.round())
    }
}

/// One line of output for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Report {
    Ready {
        status: &'static str,
    },
    Measuring {
        status: &'static str,
        peak_magnitude: f64,
    },
    Completed {
        peak_magnitude: f64,
        score: f64,
        display: String,
    },
}

impl Report {
    pub fn ready() -> Self {
        Report::Ready { status: STATUS_READY }
    }

    pub fn measuring(peak_magnitude: f64) -> Self {
        Report::Measuring {
            status: STATUS_MEASURING,
            peak_magnitude,
        }
    }

    pub fn completed(peak_magnitude: f64, display: &DisplayConfig) -> Self {
        let score = Score::from_peak(peak_magnitude, display);
        Report::Completed {
            peak_magnitude,
            score: score.0,
            display: score.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub trait Reporter {
    fn report(&mut self, report: &Report) -> Result<()>;
}

/// Writes each report as a JSON line to stdout.
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn report(&mut self, report: &Report) -> Result<()> {
        let json = report.to_json()?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{json}")?;
        out.flush()?;
        Ok(())
    }
}
