//! One measurement round: reset, subscribe, feed the detector, report, unsubscribe.

use thiserror::Error;

use crate::detector::{DetectorEvent, MeasurementResult, PunchDetector};
use crate::report::{DisplayConfig, Report, Reporter, Score};
use crate::sensor::{SampleSource, SensorError};

#[derive(Error, Debug)]
pub enum GameError {
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),
}

pub type Result<T> = std::result::Result<T, GameError>;

pub struct PunchGame<S: SampleSource> {
    detector: PunchDetector,
    source: S,
    display: DisplayConfig,
    reporters: Vec<Box<dyn Reporter>>,
}

impl<S: SampleSource> PunchGame<S> {
    pub fn new(detector: PunchDetector, source: S, display: DisplayConfig) -> Self {
        Self {
            detector,
            source,
            display,
            reporters: Vec::new(),
        }
    }

    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.push(reporter);
    }

    pub fn detector(&self) -> &PunchDetector {
        &self.detector
    }

    fn publish(&mut self, report: Report) {
        for reporter in &mut self.reporters {
            if let Err(e) = reporter.report(&report) {
                log::warn!("reporter failed: {e}");
            }
        }
    }

    /// Unsubscribe from the source, logging instead of propagating failures.
    fn stop_source(&mut self) {
        if let Err(e) = self.source.stop() {
            log::warn!("failed to unsubscribe from sample source: {e}");
        }
    }

    /// Run until a punch completes. Returns `None` if the sample stream ends first.
    ///
    /// Each call is a fresh round: the detector is reset and the source is
    /// subscribed again, so the same game can be played repeatedly.
    pub fn run(&mut self) -> Result<Option<MeasurementResult>> {
        self.detector.reset();
        self.publish(Report::ready());

        let rx = self.source.start()?;
        let mut last_peak = 0.0;

        while let Ok(sample) = rx.recv() {
            match self.detector.process_sample(sample) {
                DetectorEvent::Idle => {}
                DetectorEvent::Started => {
                    last_peak = self.detector.session().peak_magnitude;
                    log::info!("punch started at {}ms (magnitude {:.3})", sample.timestamp_ms, last_peak);
                    self.publish(Report::measuring(last_peak));
                }
                DetectorEvent::InProgress => {
                    let peak = self.detector.session().peak_magnitude;
                    if peak > last_peak {
                        last_peak = peak;
                        self.publish(Report::measuring(peak));
                    }
                }
                DetectorEvent::Completed(result) => {
                    log::debug!("measurement complete: power {:.5}", result.peak_magnitude);
                    log::info!(
                        "punch complete [peak={:.3}  score={}]",
                        result.peak_magnitude,
                        Score::from_peak(result.peak_magnitude, &self.display),
                    );
                    self.publish(Report::completed(result.peak_magnitude, &self.display));
                    self.stop_source();
                    return Ok(Some(result));
                }
            }
        }

        self.stop_source();
        log::info!("sample stream ended before a punch completed");
        Ok(None)
    }
}
