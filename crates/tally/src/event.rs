//! Typed events emitted by stream sources.
//!
//! Sources yield content ([`Post`]) interleaved with notices about the health
//! of the stream. Notices are never counted as content.

use serde::{Deserialize, Serialize};

/// Default language tag for posts that do not declare one.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Default marker that starts an embedded link inside post text.
pub const DEFAULT_LINK_MARKER: &str = "http";

/// A single content item from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Platform message ID
    #[serde(default)]
    pub id: String,
    /// Author handle
    pub author: String,
    /// Message text
    pub text: String,
    /// Declared language tag
    #[serde(default = "default_language")]
    pub lang: String,
    /// Expanded link targets referenced by the message
    #[serde(default)]
    pub links: Vec<String>,
}

fn default_language() -> String {
    UNDETERMINED_LANGUAGE.to_string()
}

impl Post {
    /// Create a new post with no links.
    pub fn new(
        author: impl Into<String>,
        text: impl Into<String>,
        lang: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            author: author.into(),
            text: text.into(),
            lang: lang.into(),
            links: Vec::new(),
        }
    }

    /// Set the message ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a link target.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }

    /// Split the post into the fields each dimension is keyed by.
    pub fn classify(&self, rule: &PhraseRule) -> ClassifiedEvent<'_> {
        ClassifiedEvent {
            phrase: rule.phrase(&self.text),
            author: &self.author,
            links: &self.links,
            language: &self.lang,
        }
    }

    /// Whether the post mentions `term` in its text, author or links.
    ///
    /// Case-insensitive. An empty term matches everything.
    pub fn matches(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        self.text.to_lowercase().contains(&needle)
            || self.author.to_lowercase().contains(&needle)
            || self
                .links
                .iter()
                .any(|link| link.to_lowercase().contains(&needle))
    }
}

/// One unit delivered by a stream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A message matching the tracked term.
    Post(Post),
    /// The source is falling behind. Informational only.
    StallWarning {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        percent_full: Option<u8>,
    },
    /// The source closed the stream.
    Disconnect {
        #[serde(default)]
        code: Option<u32>,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Anything the source could not map onto a known variant.
    #[serde(skip_deserializing)]
    Unknown { name: String },
}

impl StreamEvent {
    /// Short label for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::Post(_) => "post",
            Self::StallWarning { .. } => "stall_warning",
            Self::Disconnect { .. } => "disconnect",
            Self::Unknown { name } => name,
        }
    }

    /// Build an unknown event.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::Unknown { name: name.into() }
    }
}

impl From<Post> for StreamEvent {
    fn from(post: Post) -> Self {
        Self::Post(post)
    }
}

/// How the phrase key is derived from post text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PhraseRule {
    /// Keep only the text before the first occurrence of `marker`.
    ///
    /// Shortened links differ per message, so cutting them off keeps
    /// otherwise identical messages under one key.
    BeforeLink { marker: String },
    /// Use the text verbatim.
    FullText,
}

impl Default for PhraseRule {
    fn default() -> Self {
        Self::BeforeLink {
            marker: DEFAULT_LINK_MARKER.to_string(),
        }
    }
}

impl PhraseRule {
    /// Cut at `marker` when present.
    pub fn before_link(marker: impl Into<String>) -> Self {
        Self::BeforeLink {
            marker: marker.into(),
        }
    }

    /// Derive the phrase key for `text`.
    pub fn phrase<'a>(&self, text: &'a str) -> &'a str {
        match self {
            Self::BeforeLink { marker } if !marker.is_empty() => match text.find(marker.as_str()) {
                Some(idx) => &text[..idx],
                None => text,
            },
            Self::BeforeLink { .. } | Self::FullText => text,
        }
    }
}

/// A post broken down into per-dimension keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedEvent<'a> {
    pub phrase: &'a str,
    pub author: &'a str,
    pub links: &'a [String],
    pub language: &'a str,
}
