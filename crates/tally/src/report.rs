//! Ranked summaries of a finished sample.
//!
//! The report is plain data. Rendering it is left to the caller.

use serde::{Deserialize, Serialize};

use crate::frequency::ScoreList;
use crate::result::{Dimension, SampleResult};

/// Limits applied when building a [`SampleReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Number of authors listed as most active
    pub authors_top: usize,
    /// Number of links listed as most shared
    pub links_top: usize,
    /// Number of phrases listed as most repeated
    pub phrases_top: usize,
    /// Keys must occur strictly more often than this to be ranked
    pub repeat_threshold: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            authors_top: 10,
            links_top: 10,
            phrases_top: 20,
            repeat_threshold: 1,
        }
    }
}

/// Summary of one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSummary {
    /// Number of distinct keys seen
    pub distinct: usize,
    /// Number of keys seen more than once
    pub repeated: usize,
    /// Highest-ranked repeated keys, count descending
    pub top: ScoreList,
}

impl DimensionSummary {
    fn from_scores(scores: &ScoreList, threshold: u64, limit: usize) -> Self {
        let repeated = scores.greater_than(threshold);
        Self {
            distinct: scores.len(),
            repeated: repeated.len(),
            top: repeated.sorted().first(limit),
        }
    }
}

/// Display-ready summary of a [`SampleResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleReport {
    /// Posts recorded
    pub tracked: u64,
    /// Events skipped as unclassifiable
    pub skipped: u64,
    pub authors: DimensionSummary,
    pub links: DimensionSummary,
    pub phrases: DimensionSummary,
    /// Every language tag, count descending
    pub languages: ScoreList,
}

impl SampleResult {
    /// Build the ranked report for this result.
    pub fn build_report(&self, config: &ReportConfig) -> SampleReport {
        let summary = |dimension: Dimension, limit: usize| {
            DimensionSummary::from_scores(
                &self.table(dimension).scores(),
                config.repeat_threshold,
                limit,
            )
        };

        SampleReport {
            tracked: self.tracked(),
            skipped: self.skipped(),
            authors: summary(Dimension::Authors, config.authors_top),
            links: summary(Dimension::Links, config.links_top),
            phrases: summary(Dimension::Phrases, config.phrases_top),
            languages: self.table(Dimension::Languages).sorted_scores(),
        }
    }
}
