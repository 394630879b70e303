use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use punchpower::game::PunchGame;
use punchpower::report::{DisplayConfig, Report, Reporter};
use punchpower::sensor::ReplaySource;
use punchpower::{DetectorConfig, PunchDetector};

struct Collect(Arc<Mutex<Vec<Report>>>);

impl Reporter for Collect {
    fn report(&mut self, report: &Report) -> punchpower::report::Result<()> {
        self.0.lock().unwrap().push(report.clone());
        Ok(())
    }
}

fn run(source: ReplaySource) -> (Option<f64>, Vec<Report>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let mut game = PunchGame::new(
        PunchDetector::new(DetectorConfig::default()),
        source,
        DisplayConfig::default(),
    );
    game.add_reporter(Box::new(Collect(Arc::clone(&reports))));
    let result = game.run().unwrap().map(|r| r.peak_magnitude);
    let reports = reports.lock().unwrap().clone();
    (result, reports)
}

#[test]
fn test_recorded_jab() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("captures/jab.csv");
    let source = ReplaySource::from_path(&path, false).unwrap();
    let (peak, reports) = run(source);

    // 6.4² + 2.0² + 1.5²
    let expected = 40.96 + 4.0 + 2.25;
    assert_relative_eq!(peak.unwrap(), expected, epsilon = 1e-9);
    assert_eq!(reports.first(), Some(&Report::ready()));
    match reports.last() {
        Some(Report::Completed { display, .. }) => assert_eq!(display, "4721 points"),
        other => panic!("expected completion report, got {other:?}"),
    }
}

#[test]
fn test_json_capture_ignores_other_sensors() {
    let capture = r#"{"t":0,"x":0.0,"y":0.0,"z":0.0}
{"t":10,"x":9.0,"y":9.0,"z":9.0,"sensor":"accelerometer"}
{"t":20,"x":3.0,"y":3.0,"z":3.0}
{"t":3021,"x":0.0,"y":0.0,"z":0.0}"#;
    let source = ReplaySource::from_reader(Cursor::new(capture), false).unwrap();
    let (peak, _) = run(source);
    assert_relative_eq!(peak.unwrap(), 27.0);
}

#[test]
fn test_capture_ending_mid_window() {
    let capture = "0,3,3,3\n100,4,4,4\n";
    let source = ReplaySource::from_reader(Cursor::new(capture), false).unwrap();
    let (peak, reports) = run(source);
    assert_eq!(peak, None);
    assert_eq!(reports.len(), 3);
}

#[test]
fn test_realtime_replay_completes() {
    let capture = "0,3,3,3\n30,4,4,4\n61,0,0,0\n";
    let source = ReplaySource::from_reader(Cursor::new(capture), true).unwrap();
    let mut game = PunchGame::new(
        PunchDetector::new(DetectorConfig {
            start_threshold: 20.0,
            window_duration_ms: 60,
        }),
        source,
        DisplayConfig::default(),
    );
    let result = game.run().unwrap().unwrap();
    assert_relative_eq!(result.peak_magnitude, 48.0);
}

#[test]
fn test_realtime_round_returns_without_waiting_for_next_gap() {
    let capture = "0,3,3,3\n61,0,0,0\n3061,0,0,0\n";
    let source = ReplaySource::from_reader(Cursor::new(capture), true).unwrap();
    let reports = Arc::new(Mutex::new(Vec::new()));
    let mut game = PunchGame::new(
        PunchDetector::new(DetectorConfig {
            start_threshold: 20.0,
            window_duration_ms: 60,
        }),
        source,
        DisplayConfig::default(),
    );
    game.add_reporter(Box::new(Collect(Arc::clone(&reports))));

    let begin = Instant::now();
    let result = game.run().unwrap().unwrap();
    assert!(begin.elapsed() < Duration::from_secs(1), "took {:?}", begin.elapsed());
    assert_relative_eq!(result.peak_magnitude, 27.0);
    assert!(matches!(reports.lock().unwrap().last(), Some(Report::Completed { .. })));
}

#[test]
fn test_rounds_continue_through_the_capture() {
    // Two punches, the second one harder
    let capture = "\
0,3,3,3
100,0,0,0
3101,0,0,0
5000,0,0,0
5010,4,4,4
8011,0,0,0
9000,0,0,0
";
    let source = ReplaySource::from_reader(Cursor::new(capture), false).unwrap();
    assert_eq!(source.remaining(), 7);
    let mut game = PunchGame::new(PunchDetector::new(DetectorConfig::default()), source, DisplayConfig::default());

    let first = game.run().unwrap().unwrap();
    assert_relative_eq!(first.peak_magnitude, 27.0);
    let second = game.run().unwrap().unwrap();
    assert_relative_eq!(second.peak_magnitude, 48.0);
    assert_eq!(game.run().unwrap(), None);
}
