use crate::config::SourceConfig;
use crate::types::{ExpandBody, IndexBody, RawPost, RelayError, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

/// Trait for fetching raw posts for a tracked feed. The seam exists so
/// the dispatcher can be exercised against a scripted source.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch one page of recent posts for the feed, oldest first.
    async fn fetch_page(&self, feed_id: u64) -> Result<Vec<RawPost>>;

    /// Expand a truncated post into its full form. Posts that are not
    /// truncated pass through unchanged. Expansion failure is
    /// non-fatal: the post degrades to a stub that is dropped during
    /// normalization.
    async fn expand(&self, post: RawPost) -> RawPost;
}

/// Client for the Weibo mobile index API.
pub struct WeiboClient {
    client: Client,
    config: SourceConfig,
}

impl WeiboClient {
    pub fn new(config: SourceConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn index_url(&self, feed_id: u64) -> String {
        format!(
            "{}/api/container/getIndex?containerid=107603{}",
            self.config.base_url, feed_id
        )
    }

    fn expand_url(&self, bid: &str) -> String {
        format!("{}/statuses/show?id={}", self.config.base_url, bid)
    }

    async fn fetch_full_post(&self, bid: &str) -> Result<RawPost> {
        let url = self.expand_url(bid);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Parse(format!(
                "expansion of post {} returned HTTP {}",
                bid, status
            )));
        }

        let body: ExpandBody = response.json().await?;
        body.data
            .ok_or_else(|| RelayError::Parse(format!("expansion of post {} had no data", bid)))
    }
}

#[async_trait]
impl PostSource for WeiboClient {
    async fn fetch_page(&self, feed_id: u64) -> Result<Vec<RawPost>> {
        let url = self.index_url(feed_id);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::IndexFetch {
                feed_id,
                status: status.as_u16(),
            });
        }

        let body: IndexBody = response.json().await?;

        // The page arrives newest-first; downstream wants chronological
        // order. Cards without a post payload are ads or pinned blocks
        // and are dropped.
        let posts: Vec<RawPost> = body
            .data
            .cards
            .into_iter()
            .rev()
            .filter_map(|card| card.mblog)
            .collect();

        info!("Fetched {} posts for feed {}", posts.len(), feed_id);
        Ok(posts)
    }

    async fn expand(&self, post: RawPost) -> RawPost {
        if !post.is_long_text {
            return post;
        }

        match self.fetch_full_post(&post.bid).await {
            Ok(full) => full,
            Err(e) => {
                warn!("Failed to expand post {}: {}", post.bid, e);
                RawPost::stub()
            }
        }
    }
}
