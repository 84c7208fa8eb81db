use crate::{cli::OutputFormat, error::Result};
#[cfg(feature = "colored-output")]
use colored::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;
use tally::{DimensionSummary, SampleReport, SampleRun, SamplerState, ScoreList, StopReason};

/// Machine-readable form of a finished run.
#[derive(Debug, Serialize)]
pub struct RunOutput<'a> {
    pub term: &'a str,
    pub state: SamplerState,
    pub stop_reason: &'a StopReason,
    pub started_at: String,
    pub ended_at: String,
    pub elapsed_secs: f64,
    pub rate: f64,
    pub stall_warnings: u64,
    pub report: &'a SampleReport,
}

impl<'a> RunOutput<'a> {
    pub fn new(run: &'a SampleRun, report: &'a SampleReport) -> Self {
        Self {
            term: &run.term,
            state: run.state,
            stop_reason: &run.stop_reason,
            started_at: run.started_at.to_rfc3339(),
            ended_at: run.ended_at.to_rfc3339(),
            elapsed_secs: run.elapsed.as_secs_f64(),
            rate: run.rate(),
            stall_warnings: run.stall_warnings,
            report,
        }
    }
}

pub struct OutputManager {
    colored: bool,
    repeat_threshold: u64,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self {
            colored,
            repeat_threshold: 1,
        }
    }

    /// Count above which a key is described as repeated.
    pub fn with_repeat_threshold(mut self, threshold: u64) -> Self {
        self.repeat_threshold = threshold;
        self
    }

    pub fn banner(&self, term: &str) -> String {
        format!(
            "🚀 Starting to monitor for term: [ {} ]...\n",
            self.colorize(term, &Color::Cyan, true)
        )
    }

    pub fn format_run(
        &self,
        run: &SampleRun,
        report: &SampleReport,
        format: OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_pretty(run, report)),
            OutputFormat::Json => self.format_json(run, report, true),
            OutputFormat::JsonCompact => self.format_json(run, report, false),
        }
    }

    fn format_json(&self, run: &SampleRun, report: &SampleReport, pretty: bool) -> Result<String> {
        let output = RunOutput::new(run, report);
        let mut json = if pretty {
            serde_json::to_string_pretty(&output)
        } else {
            serde_json::to_string(&output)
        }?;
        json.push('\n');
        Ok(json)
    }

    fn format_pretty(&self, run: &SampleRun, report: &SampleReport) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "\n\n ✨ {} ✨ - time monitored: {}, total posts tracked: {}, skipped: {}, rate: {:.1}/sec.",
            self.colorize("DONE", &Color::Green, true),
            format_elapsed(run.elapsed),
            report.tracked,
            report.skipped,
            run.rate()
        );
        let _ = writeln!(
            output,
            "Stopped: {}, stall warnings: {}",
            self.colorize(&run.stop_reason.to_string(), stop_color(&run.stop_reason), false),
            run.stall_warnings
        );

        self.section(&mut output, "👨‍👨‍👦 ACCOUNTS 👨‍👨‍👦");
        let _ = writeln!(
            output,
            "Total distinct accounts: {}, amount who posted {}: {}",
            report.authors.distinct,
            self.repeated_phrase(),
            report.authors.repeated
        );
        self.push_most_active(&mut output, &report.authors);

        self.section(&mut output, "📣 LANG 📣");
        let _ = writeln!(
            output,
            "Language distribution: {}",
            self.inline_scores(&report.languages)
        );

        self.section(&mut output, "🔗 URLS 🔗");
        let _ = writeln!(
            output,
            "Total distinct URLs: {}, appeared {}: {}",
            report.links.distinct,
            self.repeated_phrase(),
            report.links.repeated
        );
        self.push_most_active(&mut output, &report.links);

        self.section(&mut output, "📃 TEXT 📃");
        let _ = writeln!(
            output,
            "Total distinct text phrases: {}, appeared {}: {}",
            report.phrases.distinct,
            self.repeated_phrase(),
            report.phrases.repeated
        );
        let _ = writeln!(
            output,
            "Top {} most common phrases:",
            report.phrases.top.len()
        );
        for score in &report.phrases.top {
            let _ = writeln!(
                output,
                "{}: {:?}",
                self.colorize(&score.count.to_string(), &Color::Yellow, false),
                score.key
            );
        }

        output
    }

    fn section(&self, output: &mut String, title: &str) {
        let _ = writeln!(output, "\n{}", self.colorize(title, &Color::Green, true));
    }

    fn push_most_active(&self, output: &mut String, summary: &DimensionSummary) {
        let _ = writeln!(output, "Most active: {}", self.inline_scores(&summary.top));
    }

    fn inline_scores(&self, scores: &ScoreList) -> String {
        if scores.is_empty() {
            return "none".to_string();
        }
        scores
            .iter()
            .map(|score| {
                format!(
                    "{} ({})",
                    self.colorize(&score.key, &Color::Cyan, false),
                    score.count
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn repeated_phrase(&self) -> String {
        match self.repeat_threshold {
            1 => "more than once".to_string(),
            n => format!("more than {n} times"),
        }
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Red => text.red(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Red,
    Cyan,
}

fn stop_color(reason: &StopReason) -> &'static Color {
    match reason {
        StopReason::Deadline | StopReason::EndOfStream => &Color::Green,
        StopReason::Disconnected { .. } | StopReason::Cancelled => &Color::Yellow,
        StopReason::SourceError { .. } => &Color::Red,
    }
}

/// Whole seconds in the `1h2m3s` form, `0s` for anything under a second.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn write_output(content: &str, output_file: Option<&std::path::Path>) -> Result<()> {
    match output_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        None => {
            print!("{content}");
            std::io::stdout().flush()?;
        }
    }
    Ok(())
}
