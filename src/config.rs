//! TOML configuration with command-line overrides applied on top.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detector::DetectorConfig;
use crate::report::DisplayConfig;

const DEFAULT_PATHS: &[&str] = &["punchpower.toml", "/etc/punchpower.toml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Broadcast reports over a Unix socket at this path.
    pub socket_path: Option<PathBuf>,
    /// Suppress JSON lines on stdout.
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub display: DisplayConfig,
    pub output: OutputConfig,
}

/// Values from the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub start_threshold: Option<f64>,
    pub window_duration_ms: Option<u64>,
    pub score_scale: Option<f64>,
    pub socket_path: Option<PathBuf>,
    pub quiet: bool,
}

impl Config {
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, or from the first default location that parses,
    /// or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let config = Self::from_toml(&contents, path)?;
            log::info!("loaded config from {}", path.display());
            return Ok(config);
        }

        for candidate in DEFAULT_PATHS {
            let candidate = Path::new(candidate);
            let Ok(contents) = fs::read_to_string(candidate) else {
                continue;
            };
            match Self::from_toml(&contents, candidate) {
                Ok(config) => {
                    log::info!("loaded config from {}", candidate.display());
                    return Ok(config);
                }
                Err(e) => log::warn!("{e}"),
            }
        }

        Ok(Self::default())
    }

    pub fn apply_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(threshold) = overrides.start_threshold {
            self.detector.start_threshold = threshold;
        }
        if let Some(window) = overrides.window_duration_ms {
            self.detector.window_duration_ms = window;
        }
        if let Some(scale) = overrides.score_scale {
            self.display.score_scale = scale;
        }
        if let Some(path) = &overrides.socket_path {
            self.output.socket_path = Some(path.clone());
        }
        if overrides.quiet {
            self.output.quiet = true;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.detector.start_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid {
                field: "detector.start_threshold",
                reason: format!("must be a finite non-negative number, got {threshold}"),
            });
        }
        let scale = self.display.score_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "display.score_scale",
                reason: format!("must be a finite positive number, got {scale}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_relative_eq!(config.detector.start_threshold, 20.0);
        assert_eq!(config.detector.window_duration_ms, 3000);
        assert_relative_eq!(config.display.score_scale, 100.0);
        assert_eq!(config.output.socket_path, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            [detector]
            window_duration_ms = 1500

            [output]
            socket_path = "/tmp/pp.sock"
        "#;
        let config = Config::from_toml(toml, Path::new("test.toml")).unwrap();
        assert_relative_eq!(config.detector.start_threshold, 20.0);
        assert_eq!(config.detector.window_duration_ms, 1500);
        assert_eq!(config.output.socket_path, Some(PathBuf::from("/tmp/pp.sock")));
    }

    #[test]
    fn test_example_file_matches_defaults() {
        let toml = include_str!("../punchpower.example.toml");
        let config = Config::from_toml(toml, Path::new("punchpower.example.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let result = Config::from_toml("[detector]\nstart_threshold = \"high\"", Path::new("bad.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let result = Config::load(Some(Path::new("/nonexistent/punchpower.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            start_threshold: Some(35.0),
            window_duration_ms: Some(0),
            score_scale: None,
            socket_path: None,
            quiet: true,
        };
        let config = Config::default().apply_overrides(&overrides);
        assert_relative_eq!(config.detector.start_threshold, 35.0);
        assert_eq!(config.detector.window_duration_ms, 0);
        assert_relative_eq!(config.display.score_scale, 100.0);
        assert!(config.output.quiet);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.detector.start_threshold = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "detector.start_threshold", .. })
        ));

        let mut config = Config::default();
        config.display.score_scale = 0.0;
        assert!(config.validate().is_err());
    }
}
