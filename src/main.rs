use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

use punchpower::config::{Config, Overrides};
use punchpower::game::PunchGame;
use punchpower::report::StdoutReporter;
use punchpower::sensor::ReplaySource;
#[cfg(unix)]
use punchpower::socket::SocketReporter;
use punchpower::PunchDetector;

/// Measure punch power from a linear-acceleration capture.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (punchpower.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Capture to replay (CSV or JSON lines), `-` for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Magnitude that starts a measurement
    #[arg(long)]
    threshold: Option<f64>,

    /// Measurement window in milliseconds
    #[arg(long)]
    window_ms: Option<u64>,

    /// Display score multiplier
    #[arg(long)]
    scale: Option<f64>,

    /// Also broadcast events on this Unix socket
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Replay samples at their recorded pace
    #[arg(long)]
    realtime: bool,

    /// Play this many rounds back to back, like pressing restart after each score
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    rounds: u32,

    /// Don't print JSON events on stdout
    #[arg(short, long)]
    quiet: bool,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    log::error!("{msg}");
    std::process::exit(1);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();

    let overrides = Overrides {
        start_threshold: args.threshold,
        window_duration_ms: args.window_ms,
        score_scale: args.scale,
        socket_path: args.socket.clone(),
        quiet: args.quiet,
    };
    let config = Config::load(args.config.as_deref())
        .unwrap_or_else(|e| fail(e))
        .apply_overrides(&overrides);
    if let Err(e) = config.validate() {
        fail(e);
    }

    let source = match args.input.as_str() {
        "-" => ReplaySource::from_reader(std::io::stdin().lock(), args.realtime),
        path => ReplaySource::from_path(std::path::Path::new(path), args.realtime),
    };
    let source = source.unwrap_or_else(|e| fail(e));
    if source.is_empty() {
        log::warn!("capture contains no readings");
    }

    let mut game = PunchGame::new(PunchDetector::new(config.detector), source, config.display);

    if !config.output.quiet {
        game.add_reporter(Box::new(StdoutReporter));
    }

    #[cfg(unix)]
    {
        if let Some(path) = &config.output.socket_path {
            match SocketReporter::bind(path) {
                Ok(reporter) => game.add_reporter(Box::new(reporter)),
                Err(e) => fail(format!("failed to bind socket {}: {e}", path.display())),
            }
        }
    }

    log::info!(
        "threshold={} window={}ms, waiting for a punch...",
        config.detector.start_threshold,
        config.detector.window_duration_ms
    );

    let mut stream_ended = false;
    let mut failure = None;
    for round in 1..=args.rounds {
        if args.rounds > 1 {
            log::info!("round {round} of {}", args.rounds);
        }
        match game.run() {
            Ok(Some(_)) => {}
            Ok(None) => {
                stream_ended = true;
                break;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    // Closes the socket before exiting
    drop(game);

    if let Some(e) = failure {
        fail(e);
    }
    if stream_ended {
        std::process::exit(2);
    }
}
