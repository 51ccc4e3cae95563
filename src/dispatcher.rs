use crate::normalize::normalize_batch;
use crate::sinks::Sink;
use crate::source::PostSource;
use crate::types::{Message, Result};
use crate::watermark::WatermarkStore;
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

/// Orchestrates one fetch cycle per feed: fetch, expand, normalize,
/// watermark-filter, fan out to every enabled sink, then advance the
/// watermark. Feeds are processed strictly one at a time.
pub struct Dispatcher {
    source: Box<dyn PostSource>,
    sinks: Vec<Box<dyn Sink>>,
    watermarks: WatermarkStore,
    feed_pause: Duration,
}

impl Dispatcher {
    pub fn new(source: Box<dyn PostSource>, watermarks: WatermarkStore) -> Self {
        Self {
            source,
            sinks: Vec::new(),
            watermarks,
            feed_pause: Duration::from_secs(15),
        }
    }

    pub fn with_feed_pause(mut self, pause: Duration) -> Self {
        self.feed_pause = pause;
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        info!("Adding sink: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Run one cycle for a feed. Returns the number of messages handed
    /// to the sinks. A fetch failure aborts before any sink runs and
    /// before the watermark moves, so the next run retries from the
    /// same watermark.
    pub async fn run_feed(&self, feed_id: u64) -> Result<usize> {
        let cycle_start = Utc::now().timestamp();
        let watermark = self.watermarks.read(feed_id)?;

        let raw = self.source.fetch_page(feed_id).await?;

        let mut expanded = Vec::with_capacity(raw.len());
        for post in raw {
            expanded.push(self.source.expand(post).await);
        }

        let messages = normalize_batch(expanded, feed_id);
        let kept: Vec<Message> = messages
            .into_iter()
            .filter(|message| message.update_at >= watermark)
            .collect();

        info!(
            "Feed {}: {} new messages past watermark {}",
            feed_id,
            kept.len(),
            watermark
        );

        // Sink failures are handled inside the sinks and never block
        // the watermark update; delivery is decoupled from ingestion.
        for sink in &self.sinks {
            sink.send_messages(&kept).await;
        }

        // The new watermark is the fetch start time, not the max
        // message timestamp, so posts published during the dispatch
        // window are picked up by the next cycle.
        self.watermarks.write(feed_id, cycle_start)?;
        Ok(kept.len())
    }

    /// Process every feed in order. A failed feed is logged and never
    /// blocks the ones after it.
    pub async fn run_all(&self, feed_ids: &[u64]) {
        for (i, &feed_id) in feed_ids.iter().enumerate() {
            match self.run_feed(feed_id).await {
                Ok(count) => info!("Feed {} done, {} messages dispatched", feed_id, count),
                Err(e) => error!("Feed {} cycle failed: {}", feed_id, e),
            }
            if i + 1 < feed_ids.len() {
                info!("Pausing {:?} before next feed", self.feed_pause);
                tokio::time::sleep(self.feed_pause).await;
            }
        }
        info!("All feeds processed");
    }
}
