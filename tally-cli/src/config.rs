use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally::{PhraseRule, ReportConfig, event::DEFAULT_LINK_MARKER};
use tracing::debug;

use crate::cli::Args;
use crate::error::{AppError, Result};

/// Term sampled when none is configured.
pub const DEFAULT_TERM: &str = "♻️";

#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PhraseMode {
    /// Drop everything from the first link marker on
    #[default]
    BeforeLink,
    /// Keep the message text as-is
    FullText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Term to monitor
    pub term: String,
    /// Sample length in milliseconds, 0 for no deadline
    pub sample_ms: u64,
    /// Progress report period in milliseconds, 0 disables
    pub report_ms: u64,
    pub phrase_mode: PhraseMode,
    pub link_marker: String,
    pub report: ReportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            term: DEFAULT_TERM.to_string(),
            sample_ms: 5 * 60 * 1000,
            report_ms: 0,
            phrase_mode: PhraseMode::default(),
            link_marker: DEFAULT_LINK_MARKER.to_string(),
            report: ReportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location when it
    /// exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| {
            AppError::InvalidInput(format!("cannot read config {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// `<config dir>/tally/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tally").join("config.toml"))
    }

    /// Override file values with whatever was given on the command line.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(term) = &args.term {
            self.term = term.clone();
        }
        if let Some(sample) = args.sample {
            self.sample_ms = whole_millis(sample);
        }
        if let Some(report) = args.report {
            self.report_ms = whole_millis(report);
        }
        if let Some(mode) = args.phrase_mode {
            self.phrase_mode = mode;
        }
        if let Some(marker) = &args.link_marker {
            self.link_marker = marker.clone();
        }
    }

    pub fn sample_duration(&self) -> Option<Duration> {
        (self.sample_ms > 0).then(|| Duration::from_millis(self.sample_ms))
    }

    pub fn report_interval(&self) -> Option<Duration> {
        (self.report_ms > 0).then(|| Duration::from_millis(self.report_ms))
    }

    pub fn phrase_rule(&self) -> PhraseRule {
        match self.phrase_mode {
            PhraseMode::BeforeLink => PhraseRule::before_link(self.link_marker.clone()),
            PhraseMode::FullText => PhraseRule::FullText,
        }
    }

    /// Render the effective configuration as TOML.
    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Milliseconds in `duration`, rounded up so a non-zero duration never
/// collapses to the "disabled" value. Saturates at `u64::MAX`.
fn whole_millis(duration: Duration) -> u64 {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.term, "♻️");
        assert_eq!(config.sample_duration(), Some(Duration::from_secs(300)));
        assert_eq!(config.report_interval(), None);
        assert_eq!(config.phrase_rule(), PhraseRule::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
term = "rust"
report_ms = 15000
phrase_mode = "full-text"

[report]
phrases_top = 5
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.term, "rust");
        assert_eq!(config.sample_ms, 300_000);
        assert_eq!(config.report_interval(), Some(Duration::from_secs(15)));
        assert_eq!(config.phrase_rule(), PhraseRule::FullText);
        assert_eq!(config.report.phrases_top, 5);
        assert_eq!(config.report.authors_top, 10);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(Some(dir.path().join("nope.toml").as_path()));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sample_ms = \"soon\"").unwrap();

        assert!(matches!(
            AppConfig::load(Some(path.as_path())),
            Err(AppError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_args_override_file() {
        let mut config = AppConfig {
            term: "from-file".to_string(),
            ..AppConfig::default()
        };
        let args = Args::try_parse_from([
            "tally",
            "--term",
            "from-cli",
            "--sample",
            "0",
            "--link-marker",
            "://",
        ])
        .unwrap();

        config.apply_args(&args);
        assert_eq!(config.term, "from-cli");
        assert_eq!(config.sample_duration(), None);
        assert_eq!(config.phrase_rule(), PhraseRule::before_link("://"));
    }

    #[test]
    fn test_sub_second_durations_keep_a_deadline() {
        let mut config = AppConfig::default();
        let args =
            Args::try_parse_from(["tally", "--sample", "500ms", "--report", "1500ms"]).unwrap();

        config.apply_args(&args);
        assert_eq!(config.sample_duration(), Some(Duration::from_millis(500)));
        assert_eq!(config.report_interval(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_whole_millis_rounds_up_and_saturates() {
        assert_eq!(whole_millis(Duration::ZERO), 0);
        assert_eq!(whole_millis(Duration::from_nanos(1)), 1);
        assert_eq!(whole_millis(Duration::from_micros(2500)), 3);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_show_round_trips() {
        let config = AppConfig::default();
        let shown = config.show().unwrap();
        let parsed: AppConfig = toml::from_str(&shown).unwrap();
        assert_eq!(parsed, config);
    }
}
