//! Tally: time-boxed sampling and frequency ranking for live event streams.
//!
//! This crate samples a stream of posts matching a tracked term for a bounded
//! window and ranks what it saw across several dimensions.
//!
//! ## Counting
//!
//! - [`FrequencyTable`] - Occurrence counts keyed by string
//! - [`ScoreList`] - Owned, chainable ranked views (`greater_than`, `sorted`, `first`)
//!
//! ## Sampling
//!
//! - [`StreamSource`] - Trait for the external event feed
//! - [`ChannelSource`] / [`JsonLinesSource`] - In-process and NDJSON sources
//! - [`StreamSampler`] - Runs one sample until deadline, cancellation or end of stream
//! - [`SampleResult`] - Per-dimension tables plus tracked/skipped counters
//!
//! ## Reporting
//!
//! - [`SampleReport`] - Display-ready ranked summary
//! - [`ProgressReporter`] - Periodic throughput snapshots

pub mod error;
pub mod event;
pub mod frequency;
pub mod progress;
pub mod report;
pub mod result;
pub mod sampler;
pub mod source;

pub use error::{Result, TallyError};
pub use event::{ClassifiedEvent, PhraseRule, Post, StreamEvent};
pub use frequency::{FrequencyTable, Score, ScoreList};
pub use progress::{ProgressReporter, ProgressSnapshot};
pub use report::{DimensionSummary, ReportConfig, SampleReport};
pub use result::{Dimension, SampleCounters, SampleResult};
pub use sampler::{SampleRun, SamplerState, StopReason, StreamSampler};
pub use source::{ChannelSource, JsonLinesSource, StreamSource, Subscription};
pub use tokio_util::sync::CancellationToken;
