use serde::{Deserialize, Serialize};

/// Normalized, sink-agnostic representation of one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub content: String,
    /// Permalink to the original post. Globally unique and stable per
    /// post, which makes it the primary dedup key.
    pub link: String,
    /// Epoch seconds.
    pub update_at: i64,
    pub images: Vec<String>,
}

// Wire shapes for the Weibo mobile index API. Unknown fields are
// ignored; everything we read is defaulted so a degraded payload
// decodes to a stub that fails the `bid` identity check downstream.

#[derive(Debug, Default, Deserialize)]
pub struct IndexBody {
    #[serde(default)]
    pub data: IndexData,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexData {
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub mblog: Option<RawPost>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpandBody {
    #[serde(default)]
    pub data: Option<RawPost>,
}

/// One unprocessed post as returned by the source API. Transient; not
/// persisted anywhere.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPost {
    #[serde(default)]
    pub bid: String,
    /// Primary text field, HTML markup.
    #[serde(default)]
    pub text: String,
    /// Plain-text fallback when `text` is blank.
    #[serde(default)]
    pub raw_text: String,
    /// Truncation flag; a truncated post must be expanded by id.
    #[serde(default)]
    pub is_long_text: bool,
    /// Position flag; 3 marks a repost, 1 an original post.
    #[serde(default)]
    pub weibo_position: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub user: Option<PostUser>,
    #[serde(default)]
    pub pics: Vec<PicEntry>,
    #[serde(default)]
    pub retweeted_status: Option<Box<RawPost>>,
}

impl RawPost {
    /// Empty stub returned when expansion fails; dropped later by the
    /// `bid` identity check in normalization.
    pub fn stub() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUser {
    #[serde(default)]
    pub screen_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PicEntry {
    #[serde(default)]
    pub large: Option<PicVersion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PicVersion {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Index fetch for feed {feed_id} returned HTTP {status}")]
    IndexFetch { feed_id: u64, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Media fetch failed for {url}: HTTP {status}")]
    MediaFetch { url: String, status: u16 },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
