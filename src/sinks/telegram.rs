use crate::config::TelegramConfig;
use crate::sinks::Sink;
use crate::types::{Message, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const DEEP_LINK_LABEL: &str = "🔗 View original post";
const RATE_LIMIT_DEFAULT_SECONDS: u64 = 10;

/// Status + decoded JSON body of one chat API call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Transport seam for the chat API. The retry protocol lives above
/// this boundary so it can be exercised with a scripted transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post(&self, method: &str, body: &Value) -> Result<ApiResponse>;
}

struct HttpChatTransport {
    client: Client,
    api_base: String,
    token: String,
}

impl HttpChatTransport {
    fn new(config: &TelegramConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn post(&self, method: &str, body: &Value) -> Result<ApiResponse> {
        // Token stays out of the logs.
        debug!("POST {}/bot****/{}", self.api_base, method);

        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status().as_u16();
        // Error responses are JSON too; tolerate anything else.
        let body = response.json().await.unwrap_or(Value::Null);

        Ok(ApiResponse { status, body })
    }
}

/// Best-effort push notification of each message to a Telegram chat.
pub struct TelegramSink {
    config: TelegramConfig,
    transport: Box<dyn ChatTransport>,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        config.validate()?;
        let transport = Box::new(HttpChatTransport::new(&config));
        Ok(Self { config, transport })
    }

    pub fn with_transport(config: TelegramConfig, transport: Box<dyn ChatTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    /// One chat API call under the delivery protocol: up to the
    /// configured attempt budget, 404 is permanent, 429/420 sleep
    /// before the next attempt, and a fixed pacing delay follows every
    /// exchange. Exhausting the budget is logged and abandoned; only a
    /// transport failure propagates.
    async fn call_api(&self, method: &str, body: &Value) -> Result<()> {
        let mut attempts = self.config.max_attempts;
        while attempts > 0 {
            attempts -= 1;

            let response = self.transport.post(method, body).await?;
            tokio::time::sleep(Duration::from_secs(self.config.pacing_seconds)).await;

            if response.status == 200 {
                return Ok(());
            }
            warn!("{} returned HTTP {}: {}", method, response.status, response.body);

            match response.status {
                // Target chat is gone; retrying cannot help.
                404 => {
                    warn!("{} target no longer exists, giving up", method);
                    return Ok(());
                }
                420 => {
                    tokio::time::sleep(Duration::from_secs(RATE_LIMIT_DEFAULT_SECONDS)).await;
                }
                429 => {
                    let retry_after = response
                        .body
                        .pointer("/parameters/retry_after")
                        .and_then(Value::as_u64)
                        .unwrap_or(RATE_LIMIT_DEFAULT_SECONDS);
                    warn!("Rate limited on {}, sleeping {}s", method, retry_after);
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                }
                _ => {}
            }
        }

        warn!(
            "Giving up on {} after {} attempts",
            method, self.config.max_attempts
        );
        Ok(())
    }

    async fn send_photo_batch(&self, urls: &[String]) -> Result<()> {
        for url in urls {
            debug!("Sending photo URL: {}", url);
            let body = json!({ "chat_id": self.config.chat_id, "photo": url });
            self.call_api("sendPhoto", &body).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, message: &Message) -> Result<()> {
        let body = json!({
            "chat_id": self.config.chat_id,
            "text": format_text(message),
            "reply_markup": {
                "inline_keyboard": [[{ "text": DEEP_LINK_LABEL, "url": message.link }]]
            },
        });
        self.call_api("sendMessage", &body).await?;

        for batch in split_photo_batches(&message.images) {
            self.send_photo_batch(batch).await?;
        }
        Ok(())
    }
}

/// Notification text: author line with an image count marker, Beijing
/// local time, then the content.
pub fn format_text(message: &Message) -> String {
    let beijing = FixedOffset::east_opt(8 * 3600).unwrap();
    let when = DateTime::from_timestamp(message.update_at, 0)
        .unwrap_or_default()
        .with_timezone(&beijing);

    let mut text = format!("{}: ", message.author);
    if !message.images.is_empty() {
        text.push_str(&format!("[{} images]", message.images.len()));
    }
    text.push('\n');
    text.push_str(&when.format("%Y-%m-%d %H:%M:%S UTC+8").to_string());
    text.push('\n');
    text.push_str(&message.content);
    text
}

/// Photo delivery grouping: fewer than 3 images go out as one batch;
/// otherwise two batches split at floor(n/2), smaller half first.
pub fn split_photo_batches(images: &[String]) -> Vec<&[String]> {
    if images.is_empty() {
        return Vec::new();
    }
    if images.len() < 3 {
        return vec![images];
    }
    let mid = images.len() / 2;
    vec![&images[..mid], &images[mid..]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://img.example/{}.jpg", i)).collect()
    }

    #[test]
    fn no_images_means_no_batches() {
        assert!(split_photo_batches(&[]).is_empty());
    }

    #[test]
    fn one_or_two_images_go_in_a_single_batch() {
        let one = urls(1);
        assert_eq!(split_photo_batches(&one), vec![&one[..]]);
        let two = urls(2);
        assert_eq!(split_photo_batches(&two), vec![&two[..]]);
    }

    #[test]
    fn five_images_split_two_then_three() {
        let five = urls(5);
        let batches = split_photo_batches(&five);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 3);
        assert_eq!(batches[0], &five[..2]);
        assert_eq!(batches[1], &five[2..]);
    }

    #[test]
    fn formats_author_time_and_content() {
        let message = Message {
            author: "singer".to_string(),
            content: "hello".to_string(),
            link: "https://weibo.com/123/abc".to_string(),
            update_at: 1650508215,
            images: vec![],
        };
        assert_eq!(format_text(&message), "singer: \n2022-04-21 10:30:15 UTC+8\nhello");
    }

    #[test]
    fn image_count_marker_appears_when_images_present() {
        let message = Message {
            author: "singer".to_string(),
            content: "hello".to_string(),
            link: "https://weibo.com/123/abc".to_string(),
            update_at: 1650508215,
            images: urls(4),
        };
        assert!(format_text(&message).starts_with("singer: [4 images]\n"));
    }
}
