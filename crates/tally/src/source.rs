//! Stream source trait and subscription types.
//!
//! A [`StreamSource`] hides transport and authentication. The sampler only
//! needs to subscribe by term, pull typed events and stop.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Result, TallyError};
use crate::event::StreamEvent;

/// Handle for an active subscription.
#[derive(Debug)]
pub struct Subscription {
    /// Source identifier
    pub source: String,
    /// Tracked term the feed is filtered by
    pub term: String,
    /// Whether the feed is open
    pub is_active: bool,
    /// Subscription start time
    pub subscribed_at: DateTime<Utc>,
    /// Events delivered on this subscription
    pub delivered: u64,
}

impl Subscription {
    /// Create a new, inactive subscription handle.
    pub fn new(source: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            term: term.into(),
            is_active: false,
            subscribed_at: Utc::now(),
            delivered: 0,
        }
    }

    /// Mark the subscription as open.
    pub fn set_active(&mut self) {
        self.is_active = true;
        self.subscribed_at = Utc::now();
    }

    /// Mark the subscription as closed.
    pub fn set_inactive(&mut self) {
        self.is_active = false;
    }
}

/// An external feed of [`StreamEvent`]s.
#[async_trait]
pub trait StreamSource: Send {
    /// Get the name of this source.
    fn name(&self) -> &str;

    /// Open the feed filtered by `term`.
    async fn subscribe(&mut self, term: &str) -> Result<Subscription>;

    /// Receive the next event.
    /// Returns None once the stream has ended.
    ///
    /// Must be cancel-safe: the sampler races it against its deadline and
    /// cancellation signal, and drops it when either wins.
    async fn receive(&mut self, subscription: &mut Subscription) -> Result<Option<StreamEvent>>;

    /// Close the feed.
    async fn stop(&mut self, subscription: &mut Subscription) -> Result<()>;
}

/// A source fed through an in-process channel.
///
/// Events are assumed to be filtered by the producer already. The stream
/// ends when every sender has been dropped.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<StreamEvent>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    pub fn new(capacity: usize) -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Wrap an existing receiver.
    pub fn from_receiver(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl StreamSource for ChannelSource {
    fn name(&self) -> &str {
        "channel"
    }

    async fn subscribe(&mut self, term: &str) -> Result<Subscription> {
        let mut subscription = Subscription::new(self.name(), term);
        subscription.set_active();
        Ok(subscription)
    }

    async fn receive(&mut self, subscription: &mut Subscription) -> Result<Option<StreamEvent>> {
        if !subscription.is_active {
            return Err(TallyError::source_error("channel subscription is closed"));
        }
        let event = self.rx.recv().await;
        if event.is_some() {
            subscription.delivered += 1;
        }
        Ok(event)
    }

    async fn stop(&mut self, subscription: &mut Subscription) -> Result<()> {
        self.rx.close();
        subscription.set_inactive();
        Ok(())
    }
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// A source reading newline-delimited JSON events.
///
/// Each line is one [`StreamEvent`] tagged by `kind`. Posts not mentioning the
/// subscribed term are dropped here, the way a remote filter would drop them.
/// Lines with an unrecognized `kind`, or that are not valid events at all,
/// are delivered as [`StreamEvent::Unknown`]. Blank lines are ignored.
pub struct JsonLinesSource {
    name: String,
    lines: Lines<BufReader<BoxedReader>>,
    term: String,
}

impl JsonLinesSource {
    /// Read events from any async reader.
    pub fn from_reader(name: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: BoxedReader = Box::new(reader);
        Self {
            name: name.into(),
            lines: BufReader::new(reader).lines(),
            term: String::new(),
        }
    }

    /// Read events from a file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::from_reader(path.display().to_string(), file))
    }

    /// Read events from standard input.
    pub fn stdin() -> Self {
        Self::from_reader("stdin", tokio::io::stdin())
    }
}

/// Decode one line, falling back to an unknown event.
fn decode_line(line: &str) -> StreamEvent {
    match serde_json::from_str::<StreamEvent>(line) {
        Ok(event) => event,
        Err(e) => {
            let name = serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .and_then(|value| value.get("kind")?.as_str().map(str::to_owned))
                .unwrap_or_else(|| "malformed".to_string());
            trace!(error = %e, kind = %name, "Undecodable event line");
            StreamEvent::unknown(name)
        }
    }
}

#[async_trait]
impl StreamSource for JsonLinesSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&mut self, term: &str) -> Result<Subscription> {
        self.term = term.to_string();
        let mut subscription = Subscription::new(self.name.clone(), term);
        subscription.set_active();
        debug!(source = %self.name, term = %term, "Subscribed to event lines");
        Ok(subscription)
    }

    async fn receive(&mut self, subscription: &mut Subscription) -> Result<Option<StreamEvent>> {
        if !subscription.is_active {
            return Err(TallyError::source_error(format!(
                "{} subscription is closed",
                self.name
            )));
        }

        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let event = decode_line(line);
            if let StreamEvent::Post(post) = &event
                && !post.matches(&self.term)
            {
                continue;
            }

            subscription.delivered += 1;
            return Ok(Some(event));
        }

        Ok(None)
    }

    async fn stop(&mut self, subscription: &mut Subscription) -> Result<()> {
        subscription.set_inactive();
        Ok(())
    }
}
