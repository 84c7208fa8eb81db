//! Time-boxed sampling runs.
//!
//! A [`StreamSampler`] drives one run from `Idle` to a terminal state:
//! - consumes events from a [`StreamSource`] until the deadline, a cancellation
//!   signal or the end of the stream;
//! - records posts into the [`SampleResult`] it owns;
//! - hands the result back by value once the run is over.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::event::{PhraseRule, StreamEvent};
use crate::result::{SampleCounters, SampleResult};
use crate::source::{StreamSource, Subscription};

/// Lifecycle of a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SamplerState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopReason {
    /// The sample duration elapsed.
    #[strum(to_string = "deadline reached")]
    Deadline,
    /// The source ended the stream in an orderly way.
    #[strum(to_string = "end of stream")]
    EndOfStream,
    /// The source sent a disconnect notice.
    #[strum(to_string = "disconnected")]
    Disconnected { reason: Option<String> },
    /// Receiving from the source failed.
    #[strum(to_string = "source error: {error}")]
    SourceError { error: String },
    /// The run was cancelled from outside.
    #[strum(to_string = "cancelled")]
    Cancelled,
}

impl StopReason {
    /// The terminal state this reason leads to.
    pub fn state(&self) -> SamplerState {
        match self {
            Self::Cancelled => SamplerState::Cancelled,
            _ => SamplerState::Completed,
        }
    }
}

/// Outcome of one loop wakeup.
#[derive(Debug, PartialEq)]
enum Dispatch {
    Continue,
    Stop(StopReason),
}

/// Record of a finished run.
#[derive(Debug)]
pub struct SampleRun {
    /// Terminal state, `Completed` or `Cancelled`
    pub state: SamplerState,
    pub stop_reason: StopReason,
    /// Tracked term
    pub term: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Time spent in `Running`
    pub elapsed: Duration,
    /// Stall warnings received from the source
    pub stall_warnings: u64,
    pub result: SampleResult,
}

impl SampleRun {
    /// Posts recorded per second over the run.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.result.tracked() as f64 / secs
        } else {
            0.0
        }
    }

    /// Whether the run was cut short by cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.state == SamplerState::Cancelled
    }
}

/// Drives a single sampling run over a stream source.
///
/// The sampler owns its [`SampleResult`] for the whole run, so the tables have
/// exactly one writer. [`StreamSampler::run`] consumes the sampler: a finished
/// sampler cannot be restarted.
pub struct StreamSampler<S> {
    source: S,
    phrase_rule: PhraseRule,
    result: SampleResult,
    state: SamplerState,
    stall_warnings: u64,
}

impl<S: StreamSource> StreamSampler<S> {
    /// Create an idle sampler over `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            phrase_rule: PhraseRule::default(),
            result: SampleResult::new(),
            state: SamplerState::Idle,
            stall_warnings: 0,
        }
    }

    /// Set the phrase classification rule.
    pub fn with_phrase_rule(mut self, rule: PhraseRule) -> Self {
        self.phrase_rule = rule;
        self
    }

    /// Current state. Always `Idle` before [`Self::run`].
    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// Counters for progress reporting, readable while the run is in flight.
    pub fn counters(&self) -> SampleCounters {
        self.result.counters()
    }

    /// Sample `term` until `duration` elapses, `cancel` fires or the stream
    /// ends.
    ///
    /// `None` or a zero duration means no deadline. Cancellation is not an
    /// error: the partial result is returned in a `Cancelled` run. Only a
    /// failure to subscribe is reported as `Err`.
    pub async fn run(
        mut self,
        term: &str,
        duration: Option<Duration>,
        cancel: CancellationToken,
    ) -> Result<SampleRun> {
        let mut subscription = self.source.subscribe(term).await?;

        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = duration.filter(|d| !d.is_zero());
        let sleep = tokio::time::sleep(deadline.unwrap_or_default());
        tokio::pin!(sleep);

        self.state = SamplerState::Running;
        info!(
            source = %self.source.name(),
            term = %term,
            duration = ?deadline,
            "Sampling started"
        );

        let stop_reason = loop {
            let dispatch = tokio::select! {
                biased;

                _ = cancel.cancelled() => Dispatch::Stop(StopReason::Cancelled),

                _ = &mut sleep, if deadline.is_some() => Dispatch::Stop(StopReason::Deadline),

                received = self.source.receive(&mut subscription) => self.handle_receive(received),
            };

            if let Dispatch::Stop(reason) = dispatch {
                break reason;
            }
        };

        self.finish(&mut subscription).await;
        self.state = stop_reason.state();

        let run = SampleRun {
            state: self.state,
            stop_reason,
            term: term.to_string(),
            started_at,
            ended_at: Utc::now(),
            elapsed: start.elapsed(),
            stall_warnings: self.stall_warnings,
            result: self.result,
        };

        info!(
            state = %run.state,
            reason = %run.stop_reason,
            tracked = run.result.tracked(),
            skipped = run.result.skipped(),
            elapsed = ?run.elapsed,
            "Sampling finished"
        );

        Ok(run)
    }

    /// Close the feed. Failures are logged only; the run is already over.
    async fn finish(&mut self, subscription: &mut Subscription) {
        if let Err(e) = self.source.stop(subscription).await {
            warn!(source = %self.source.name(), error = %e, "Failed to stop source");
        }
    }

    /// Handle the result of receiving from the source.
    fn handle_receive(&mut self, received: Result<Option<StreamEvent>>) -> Dispatch {
        match received {
            Ok(Some(event)) => self.handle_event(event),
            Ok(None) => Dispatch::Stop(StopReason::EndOfStream),
            Err(e) => {
                // Reconnecting is the source's job; a failure here ends the run.
                warn!(source = %self.source.name(), error = %e, "Source failed, ending run");
                Dispatch::Stop(StopReason::SourceError {
                    error: e.to_string(),
                })
            }
        }
    }

    fn handle_event(&mut self, event: StreamEvent) -> Dispatch {
        match event {
            StreamEvent::Post(post) => {
                self.result.record(&post.classify(&self.phrase_rule));
                Dispatch::Continue
            }
            StreamEvent::StallWarning {
                message,
                percent_full,
            } => {
                self.stall_warnings += 1;
                warn!(
                    message = message.as_deref().unwrap_or(""),
                    percent_full = ?percent_full,
                    "Stall warning, falling behind"
                );
                Dispatch::Continue
            }
            StreamEvent::Disconnect { code, reason } => {
                info!(code = ?code, reason = ?reason, "Source disconnected");
                Dispatch::Stop(StopReason::Disconnected { reason })
            }
            StreamEvent::Unknown { name } => {
                self.result.record_skipped();
                debug!(kind = %name, "Skipping unrecognized event");
                Dispatch::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Post;
    use crate::result::Dimension;
    use crate::source::ChannelSource;

    #[test]
    fn test_stop_reason_state() {
        assert_eq!(StopReason::Deadline.state(), SamplerState::Completed);
        assert_eq!(StopReason::EndOfStream.state(), SamplerState::Completed);
        assert_eq!(
            StopReason::Disconnected { reason: None }.state(),
            SamplerState::Completed
        );
        assert_eq!(StopReason::Cancelled.state(), SamplerState::Cancelled);
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::Deadline.to_string(), "deadline reached");
        assert_eq!(
            StopReason::SourceError {
                error: "reset".into()
            }
            .to_string(),
            "source error: reset"
        );
        assert_eq!(SamplerState::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_new_sampler_is_idle() {
        let (_tx, source) = ChannelSource::new(1);
        let sampler = StreamSampler::new(source);
        assert_eq!(sampler.state(), SamplerState::Idle);
        assert_eq!(sampler.counters().tracked(), 0);
    }

    #[tokio::test]
    async fn test_notices_do_not_count() {
        let (tx, source) = ChannelSource::new(8);
        tx.send(StreamEvent::StallWarning {
            message: Some("behind".into()),
            percent_full: Some(95),
        })
        .await
        .unwrap();
        tx.send(StreamEvent::unknown("scrub_geo")).await.unwrap();
        tx.send(Post::new("a", "hi", "en").into()).await.unwrap();
        drop(tx);

        let run = StreamSampler::new(source)
            .run("", None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.state, SamplerState::Completed);
        assert_eq!(run.stop_reason, StopReason::EndOfStream);
        assert_eq!(run.stall_warnings, 1);
        assert_eq!(run.result.tracked(), 1);
        assert_eq!(run.result.skipped(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_completes_run() {
        let (tx, source) = ChannelSource::new(8);
        tx.send(Post::new("a", "hi", "en").into()).await.unwrap();
        tx.send(StreamEvent::Disconnect {
            code: Some(7),
            reason: Some("duplicate stream".into()),
        })
        .await
        .unwrap();
        tx.send(Post::new("b", "after", "en").into()).await.unwrap();

        let run = StreamSampler::new(source)
            .run("", None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.state, SamplerState::Completed);
        assert_eq!(
            run.stop_reason,
            StopReason::Disconnected {
                reason: Some("duplicate stream".into())
            }
        );
        assert_eq!(run.result.tracked(), 1);
        assert_eq!(run.result.table(Dimension::Authors).count("b"), 0);
    }

    #[tokio::test]
    async fn test_full_text_rule() {
        let (tx, source) = ChannelSource::new(8);
        tx.send(Post::new("a", "hello http://x.co more", "en").into())
            .await
            .unwrap();
        drop(tx);

        let run = StreamSampler::new(source)
            .with_phrase_rule(PhraseRule::FullText)
            .run("", None, CancellationToken::new())
            .await
            .unwrap();

        let phrases = run.result.table(Dimension::Phrases);
        assert_eq!(phrases.count("hello http://x.co more"), 1);
        assert_eq!(phrases.count("hello "), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_completes_idle_run() {
        let (tx, source) = ChannelSource::new(8);
        tx.send(Post::new("a", "hi", "en").into()).await.unwrap();

        let run = StreamSampler::new(source)
            .run("", Some(Duration::from_secs(300)), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.state, SamplerState::Completed);
        assert_eq!(run.stop_reason, StopReason::Deadline);
        assert_eq!(run.result.tracked(), 1);
        assert!(run.elapsed >= Duration::from_secs(300));
        assert!(run.rate() > 0.0);
        drop(tx);
    }

    #[tokio::test]
    async fn test_cancel_before_any_event() {
        let (_tx, source) = ChannelSource::new(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = StreamSampler::new(source)
            .run("", Some(Duration::from_secs(60)), cancel)
            .await
            .unwrap();

        assert!(run.is_cancelled());
        assert_eq!(run.stop_reason, StopReason::Cancelled);
        assert_eq!(run.result.tracked(), 0);
    }

    #[tokio::test]
    async fn test_zero_duration_means_no_deadline() {
        let (tx, source) = ChannelSource::new(8);
        tx.send(Post::new("a", "hi", "en").into()).await.unwrap();
        drop(tx);

        let run = StreamSampler::new(source)
            .run("", Some(Duration::ZERO), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.stop_reason, StopReason::EndOfStream);
        assert_eq!(run.result.tracked(), 1);
    }
}
