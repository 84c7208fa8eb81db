use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::PhraseMode;

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    author,
    version,
    about = "Sample a live event stream for a while and rank what it contained",
    long_about = None
)]
pub struct Args {
    /// Term to monitor
    #[arg(short, long)]
    pub term: Option<String>,

    /// Sample length, e.g. 500ms, 1.5m, 1h30m. 0 samples until the stream ends
    #[arg(short, long, value_parser = parse_duration)]
    pub sample: Option<Duration>,

    /// Periodically report on progress, e.g. 10s. 0 disables reporting
    #[arg(short, long, value_parser = parse_duration)]
    pub report: Option<Duration>,

    /// Newline-delimited JSON event feed, `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// How message text is turned into a phrase key
    #[arg(long, value_enum)]
    pub phrase_mode: Option<PhraseMode>,

    /// Marker that starts an embedded link in message text
    #[arg(long)]
    pub link_marker: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable sections
    Pretty,
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    JsonCompact,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::JsonCompact)
    }
}

/// Parse Go-style durations such as `300ms`, `1.5s`, `5m` or `1h30m`.
///
/// Each component is a decimal number followed by one of `ns`, `us`, `µs`,
/// `ms`, `s`, `m` or `h`. A bare `0` is zero.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    let out_of_range = || format!("duration '{input}' is out of range");

    let mut total_nanos: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in duration '{input}'"))?;
        let (whole, fraction) = match rest[..number_len].split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (&rest[..number_len], ""),
        };
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(format!("invalid duration '{input}'"));
        }
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3600 * 1_000_000_000,
            unit => return Err(format!("unknown unit '{unit}' in duration '{input}'")),
        };
        rest = &rest[unit_len..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        let mut part = whole.checked_mul(unit_nanos).ok_or_else(out_of_range)?;

        // Digits past nanosecond precision cannot change the result.
        let fraction = &fraction[..fraction.len().min(18)];
        if !fraction.is_empty() {
            let digits: u128 = fraction.parse().map_err(|_| out_of_range())?;
            let scale = 10u128.pow(fraction.len() as u32);
            part = part
                .checked_add(digits * unit_nanos / scale)
                .ok_or_else(out_of_range)?;
        }

        total_nanos = total_nanos.checked_add(part).ok_or_else(out_of_range)?;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| out_of_range())?;
    Ok(Duration::new(secs, (total_nanos % 1_000_000_000) as u32))
}
