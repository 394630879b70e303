//! Sample sources for the measurement round.
//!
//! A source is subscribed with [`SampleSource::start`], which hands back the
//! receiving end of a channel, and unsubscribed with [`SampleSource::stop`].
//! The replay source plays a recorded linear-acceleration capture on a
//! dedicated thread, the same way a live sensor callback would push readings.
//! Stopping interrupts any pending wait, so unsubscribing returns promptly.

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::detector::Sample;

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("failed to read capture: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("source is already subscribed")]
    AlreadySubscribed,

    #[error("replay worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, SensorError>;

pub trait SampleSource {
    /// Subscribe and start delivering samples.
    fn start(&mut self) -> Result<mpsc::Receiver<Sample>>;

    /// Unsubscribe. Calling this on a stopped source is a no-op.
    fn stop(&mut self) -> Result<()>;
}

/// Which sensor produced a reading. Only linear acceleration drives the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    #[default]
    LinearAcceleration,
    Accelerometer,
    Gyroscope,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub kind: SensorKind,
    pub sample: Sample,
}

#[derive(Deserialize)]
struct JsonReading {
    t: u64,
    x: f64,
    y: f64,
    z: f64,
    #[serde(default)]
    sensor: SensorKind,
}

/// Parse one data line. With `allow_header`, a CSV row whose timestamp isn't a
/// number is taken as the header and yields `None`.
fn parse_line(trimmed: &str, line_no: usize, allow_header: bool) -> Result<Option<Reading>> {
    let parse_err = |reason: String| SensorError::Parse {
        line: line_no,
        reason,
    };

    let reading = if trimmed.starts_with('{') {
        let r: JsonReading = serde_json::from_str(trimmed).map_err(|e| parse_err(e.to_string()))?;
        Reading {
            kind: r.sensor,
            sample: Sample::new(r.x, r.y, r.z, r.t),
        }
    } else {
        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(parse_err(format!("expected 4 fields, got {}", fields.len())));
        }
        let timestamp_ms = match fields[0].parse::<u64>() {
            Ok(t) => t,
            Err(_) if allow_header => return Ok(None),
            Err(e) => return Err(parse_err(format!("bad timestamp {:?}: {e}", fields[0]))),
        };
        let mut axes = [0.0f64; 3];
        for (axis, field) in axes.iter_mut().zip(&fields[1..]) {
            *axis = field
                .parse::<f64>()
                .map_err(|e| parse_err(format!("bad component {field:?}: {e}")))?;
        }
        Reading {
            kind: SensorKind::LinearAcceleration,
            sample: Sample::new(axes[0], axes[1], axes[2], timestamp_ms),
        }
    };

    let s = reading.sample;
    if !(s.x.is_finite() && s.y.is_finite() && s.z.is_finite()) {
        return Err(parse_err("non-finite acceleration component".into()));
    }

    Ok(Some(reading))
}

/// Parse a whole capture (CSV or JSON lines, may be mixed). Blank lines and
/// `#` comments are skipped; the first remaining line may be a CSV header.
pub fn parse_capture<R: BufRead>(reader: R) -> Result<Vec<Reading>> {
    let mut readings = Vec::new();
    let mut seen_content = false;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(reading) = parse_line(trimmed, idx + 1, !seen_content)? {
            readings.push(reading);
        }
        seen_content = true;
    }
    Ok(readings)
}

/// How long the worker waits for the consumer before checking for a stop again.
const HANDOFF_POLL: Duration = Duration::from_micros(200);

struct Worker {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Waits for `timeout` unless a stop arrives first. Returns false on stop.
fn wait_unless_stopped(stop: &mpsc::Receiver<()>, timeout: Duration) -> bool {
    matches!(stop.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
}

/// Hands one sample to the consumer. Returns false if the source was stopped
/// or the consumer went away before taking it.
fn hand_off(tx: &mpsc::SyncSender<Sample>, stop: &mpsc::Receiver<()>, sample: Sample) -> bool {
    loop {
        match tx.try_send(sample) {
            Ok(()) => return true,
            Err(TrySendError::Disconnected(_)) => return false,
            Err(TrySendError::Full(_)) => {
                if !wait_unless_stopped(stop, HANDOFF_POLL) {
                    return false;
                }
            }
        }
    }
}

/// Plays back a recorded capture. With `realtime` set, the worker waits for
/// the gap between consecutive timestamps before sending each sample.
///
/// Samples are handed over one at a time, so the source knows exactly how
/// far the consumer got. A later `start` resumes from the first reading the
/// previous subscription did not deliver.
pub struct ReplaySource {
    readings: Arc<Vec<Reading>>,
    position: Arc<AtomicUsize>,
    realtime: bool,
    worker: Option<Worker>,
}

impl ReplaySource {
    pub fn new(readings: Vec<Reading>, realtime: bool) -> Self {
        Self {
            readings: Arc::new(readings),
            position: Arc::new(AtomicUsize::new(0)),
            realtime,
            worker: None,
        }
    }

    pub fn from_reader<R: BufRead>(reader: R, realtime: bool) -> Result<Self> {
        Ok(Self::new(parse_capture(reader)?, realtime))
    }

    pub fn from_path(path: &Path, realtime: bool) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), realtime)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Readings not yet delivered.
    pub fn remaining(&self) -> usize {
        self.readings.len() - self.position.load(Ordering::Acquire).min(self.readings.len())
    }
}

impl SampleSource for ReplaySource {
    fn start(&mut self) -> Result<mpsc::Receiver<Sample>> {
        if self.worker.is_some() {
            return Err(SensorError::AlreadySubscribed);
        }

        let (tx, rx) = mpsc::sync_channel(0);
        let (stop_tx, stop_rx) = mpsc::channel();
        let readings = Arc::clone(&self.readings);
        let position = Arc::clone(&self.position);
        let realtime = self.realtime;

        let handle = thread::spawn(move || {
            let mut last_ts: Option<u64> = None;
            let mut next = position.load(Ordering::Acquire);
            while let Some(reading) = readings.get(next) {
                if reading.kind != SensorKind::LinearAcceleration {
                    log::trace!("skipping {:?} reading at {}ms", reading.kind, reading.sample.timestamp_ms);
                    next += 1;
                    position.store(next, Ordering::Release);
                    continue;
                }
                if realtime {
                    if let Some(prev) = last_ts {
                        let gap = reading.sample.timestamp_ms.saturating_sub(prev);
                        if !wait_unless_stopped(&stop_rx, Duration::from_millis(gap)) {
                            break;
                        }
                    }
                    last_ts = Some(reading.sample.timestamp_ms);
                }
                if !hand_off(&tx, &stop_rx, reading.sample) {
                    break;
                }
                next += 1;
                position.store(next, Ordering::Release);
            }
            log::debug!("replay paused at reading {next} of {}", readings.len());
        });

        log::info!("replay source active ({} readings left)", self.remaining());
        self.worker = Some(Worker { stop: stop_tx, handle });
        Ok(rx)
    }

    fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // Fails only if the worker already finished
        let _ = worker.stop.send(());
        worker.handle.join().map_err(|_| SensorError::WorkerPanicked)
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("failed to stop replay source: {e}");
        }
    }
}
