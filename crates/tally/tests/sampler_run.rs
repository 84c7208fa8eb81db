//! End-to-end sampling runs over scripted sources.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tally::{
    CancellationToken, ChannelSource, Dimension, JsonLinesSource, Post, ReportConfig, Result,
    SampleResult, SamplerState, Score, StopReason, StreamEvent, StreamSampler, StreamSource,
    Subscription, TallyError,
};

fn counts(result: &SampleResult, dimension: Dimension) -> Vec<(String, u64)> {
    result
        .table(dimension)
        .sorted_scores()
        .into_iter()
        .map(|s| (s.key, s.count))
        .collect()
}

fn pairs(expected: &[(&str, u64)]) -> Vec<(String, u64)> {
    expected.iter().map(|(k, c)| (k.to_string(), *c)).collect()
}

/// Plays back a fixed list of events, cancelling a token once it has handed
/// out `cancel_after` of them and then waiting forever.
struct ScriptedSource {
    events: VecDeque<StreamEvent>,
    delivered: usize,
    cancel_after: usize,
    cancel: CancellationToken,
    stopped: bool,
}

impl ScriptedSource {
    fn new(events: Vec<StreamEvent>, cancel_after: usize, cancel: CancellationToken) -> Self {
        Self {
            events: events.into(),
            delivered: 0,
            cancel_after,
            cancel,
            stopped: false,
        }
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn subscribe(&mut self, term: &str) -> Result<Subscription> {
        let mut subscription = Subscription::new(self.name(), term);
        subscription.set_active();
        Ok(subscription)
    }

    async fn receive(&mut self, subscription: &mut Subscription) -> Result<Option<StreamEvent>> {
        if self.delivered == self.cancel_after {
            self.cancel.cancel();
            std::future::pending::<()>().await;
        }
        self.delivered += 1;
        subscription.delivered += 1;
        Ok(self.events.pop_front())
    }

    async fn stop(&mut self, subscription: &mut Subscription) -> Result<()> {
        self.stopped = true;
        subscription.set_inactive();
        Ok(())
    }
}

/// Fails every receive.
struct BrokenSource;

#[async_trait]
impl StreamSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn subscribe(&mut self, term: &str) -> Result<Subscription> {
        let mut subscription = Subscription::new(self.name(), term);
        subscription.set_active();
        Ok(subscription)
    }

    async fn receive(&mut self, _subscription: &mut Subscription) -> Result<Option<StreamEvent>> {
        Err(TallyError::source_error("connection reset"))
    }

    async fn stop(&mut self, _subscription: &mut Subscription) -> Result<()> {
        Err(TallyError::source_error("already closed"))
    }
}

/// Refuses to subscribe.
struct UnreachableSource;

#[async_trait]
impl StreamSource for UnreachableSource {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn subscribe(&mut self, _term: &str) -> Result<Subscription> {
        Err(TallyError::source_error("unauthorized"))
    }

    async fn receive(&mut self, _subscription: &mut Subscription) -> Result<Option<StreamEvent>> {
        Ok(None)
    }

    async fn stop(&mut self, _subscription: &mut Subscription) -> Result<()> {
        Ok(())
    }
}

fn three_posts() -> Vec<StreamEvent> {
    vec![
        Post::new("a", "hi", "en").into(),
        Post::new("a", "hi", "en").into(),
        Post::new("b", "yo", "fr").into(),
    ]
}

#[tokio::test]
async fn test_end_of_stream_after_three_posts() {
    let (tx, source) = ChannelSource::new(16);
    for event in three_posts() {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    let run = StreamSampler::new(source)
        .run("", Some(Duration::from_secs(300)), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state, SamplerState::Completed);
    assert_eq!(run.stop_reason, StopReason::EndOfStream);
    assert_eq!(run.result.tracked(), 3);
    assert_eq!(run.result.skipped(), 0);
    assert_eq!(
        counts(&run.result, Dimension::Authors),
        pairs(&[("a", 2), ("b", 1)])
    );
    assert_eq!(
        counts(&run.result, Dimension::Phrases),
        pairs(&[("hi", 2), ("yo", 1)])
    );
    assert_eq!(
        counts(&run.result, Dimension::Languages),
        pairs(&[("en", 2), ("fr", 1)])
    );
    assert!(run.result.table(Dimension::Links).is_empty());
}

#[tokio::test]
async fn test_cancellation_mid_run_keeps_partial_result() {
    let cancel = CancellationToken::new();
    let source = ScriptedSource::new(three_posts(), 1, cancel.clone());

    let run = StreamSampler::new(source)
        .run("", Some(Duration::from_secs(300)), cancel)
        .await
        .unwrap();

    assert_eq!(run.state, SamplerState::Cancelled);
    assert_eq!(run.stop_reason, StopReason::Cancelled);
    assert_eq!(run.result.tracked(), 1);
    assert_eq!(counts(&run.result, Dimension::Authors), pairs(&[("a", 1)]));
}

#[tokio::test]
async fn test_source_error_ends_run_with_partial_result() {
    let run = StreamSampler::new(BrokenSource)
        .run("", None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state, SamplerState::Completed);
    assert_eq!(
        run.stop_reason,
        StopReason::SourceError {
            error: "Source error: connection reset".to_string()
        }
    );
    assert_eq!(run.result.tracked(), 0);
}

#[tokio::test]
async fn test_subscribe_failure_is_an_error() {
    let result = StreamSampler::new(UnreachableSource)
        .run("rust", None, CancellationToken::new())
        .await;

    assert!(matches!(result, Err(TallyError::Source(_))));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_while_source_is_quiet() {
    let (tx, source) = ChannelSource::new(16);
    let sender = tokio::spawn(async move {
        for event in three_posts() {
            tx.send(event).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        // Keep the stream open well past the deadline.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        drop(tx);
    });

    let run = StreamSampler::new(source)
        .run("", Some(Duration::from_secs(25)), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.stop_reason, StopReason::Deadline);
    assert_eq!(run.result.tracked(), 3);
    sender.abort();
}

#[tokio::test]
async fn test_json_lines_report() {
    let input = [
        r#"{"kind":"post","author":"greta","text":"Reuse it ♻️ https://t.co/a","lang":"en","links":["https://reuse.example"]}"#,
        r#"{"kind":"post","author":"greta","text":"Reuse it ♻️ https://t.co/b","lang":"en","links":["https://reuse.example"]}"#,
        r#"{"kind":"post","author":"li","text":"回收 ♻️","lang":"zh"}"#,
        r#"{"kind":"post","author":"sam","text":"off topic","lang":"en"}"#,
        r#"{"kind":"stall_warning","percent_full":60}"#,
        r#"{"kind":"scrub_geo","user_id":1}"#,
    ]
    .join("\n");
    let source = JsonLinesSource::from_reader("fixture", std::io::Cursor::new(input));

    let run = StreamSampler::new(source)
        .run("♻️", None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.term, "♻️");
    assert_eq!(run.stall_warnings, 1);

    let report = run.result.build_report(&ReportConfig::default());
    assert_eq!(report.tracked, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.authors.distinct, 2);
    assert_eq!(report.authors.top.as_slice(), &[Score::new("greta", 2)]);
    assert_eq!(
        report.phrases.top.as_slice(),
        &[Score::new("Reuse it ♻️ ", 2)]
    );
    assert_eq!(
        report.links.top.as_slice(),
        &[Score::new("https://reuse.example", 2)]
    );
    assert_eq!(
        report.languages.as_slice(),
        &[Score::new("en", 2), Score::new("zh", 1)]
    );
}
