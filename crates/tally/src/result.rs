//! Per-run accumulation of frequency tables.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::event::ClassifiedEvent;
use crate::frequency::FrequencyTable;

/// A tracked attribute of stream content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    /// Message text, see [`crate::PhraseRule`]
    Phrases,
    /// Author handles
    Authors,
    /// Expanded link targets
    Links,
    /// Declared language tags
    Languages,
}

/// Event counters shared with observers outside the sampling loop.
///
/// Cloning yields another handle to the same counters. Only the loop that owns
/// the [`SampleResult`] increments them; every other holder just reads.
#[derive(Debug, Clone, Default)]
pub struct SampleCounters {
    tracked: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

impl SampleCounters {
    /// Content events recorded so far.
    pub fn tracked(&self) -> u64 {
        self.tracked.load(Ordering::Relaxed)
    }

    /// Unclassifiable events skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    fn record_tracked(&self) {
        self.tracked.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Frequency tables for one sampling run.
///
/// The sum of a table's counts is unrelated to [`SampleResult::tracked`]: a
/// post increments the links table once per link, possibly zero times.
#[derive(Debug, Default)]
pub struct SampleResult {
    phrases: FrequencyTable,
    authors: FrequencyTable,
    links: FrequencyTable,
    languages: FrequencyTable,
    counters: SampleCounters,
}

impl SampleResult {
    /// Create a result with one empty table per dimension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one classified post.
    pub fn record(&mut self, event: &ClassifiedEvent<'_>) {
        self.phrases.increment(event.phrase);
        self.authors.increment(event.author);
        self.languages.increment(event.language);
        for link in event.links {
            self.links.increment(link);
        }
        self.counters.record_tracked();
    }

    /// Record an event that could not be classified.
    pub fn record_skipped(&mut self) {
        self.counters.record_skipped();
    }

    /// The table backing `dimension`.
    pub fn table(&self, dimension: Dimension) -> &FrequencyTable {
        match dimension {
            Dimension::Phrases => &self.phrases,
            Dimension::Authors => &self.authors,
            Dimension::Links => &self.links,
            Dimension::Languages => &self.languages,
        }
    }

    /// Iterate over every dimension and its table.
    pub fn tables(&self) -> impl Iterator<Item = (Dimension, &FrequencyTable)> {
        Dimension::iter().map(move |d| (d, self.table(d)))
    }

    /// Content events recorded.
    pub fn tracked(&self) -> u64 {
        self.counters.tracked()
    }

    /// Events skipped as unclassifiable. Never included in [`Self::tracked`].
    pub fn skipped(&self) -> u64 {
        self.counters.skipped()
    }

    /// A read handle on the counters for progress reporting.
    pub fn counters(&self) -> SampleCounters {
        self.counters.clone()
    }
}
