use crate::config::LedgerConfig;
use crate::sinks::Sink;
use crate::types::{Message, RelayError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, error, info};
use url::Url;

const LEDGER_FILENAME: &str = "index.csv";
const MEDIA_DIRNAME: &str = "images";
const LEDGER_HEADER: &str = "user,content,link,update_at\n";

/// Transport seam for mirroring media files.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

struct HttpMediaFetcher {
    client: Client,
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::MediaFetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Durable record of every dispatched message plus a local mirror of
/// its images: an append-only CSV under the configured root, images in
/// a flat subdirectory named by the URL's final path segment.
pub struct LedgerSink {
    ledger_path: PathBuf,
    media_dir: PathBuf,
    root: PathBuf,
    fetcher: Box<dyn MediaFetcher>,
}

impl LedgerSink {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        Self::with_fetcher(config, Box::new(HttpMediaFetcher { client: Client::new() }))
    }

    pub fn with_fetcher(config: LedgerConfig, fetcher: Box<dyn MediaFetcher>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger_path: config.root.join(LEDGER_FILENAME),
            media_dir: config.root.join(MEDIA_DIRNAME),
            root: config.root,
            fetcher,
        })
    }

    /// Idempotent create of the ledger file (with its header row) and
    /// the media directory. Runs before every write so external
    /// deletion between runs is tolerated.
    fn ensure_created(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(&self.media_dir)?;
        if !self.ledger_path.exists() {
            fs::write(&self.ledger_path, LEDGER_HEADER)?;
        }
        Ok(())
    }

    fn append_record(&self, message: &Message) -> Result<()> {
        let line = record_line(message)?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.ledger_path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    async fn mirror_images(&self, message: &Message) -> Result<()> {
        for url in &message.images {
            let bytes = self.fetcher.fetch(url).await?;
            let path = self.media_dir.join(media_file_name(url)?);
            // A name collision silently overwrites the earlier file.
            fs::write(&path, &bytes)?;
            info!(
                "Saved image to {} ({:.2}MiB)",
                path.display(),
                bytes.len() as f64 / 1024.0 / 1024.0
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for LedgerSink {
    fn name(&self) -> &str {
        "ledger"
    }

    /// The record is appended before any image download, so a media
    /// failure leaves the record in place with some images missing.
    /// There is no rollback.
    async fn send_message(&self, message: &Message) -> Result<()> {
        self.ensure_created()?;
        self.append_record(message)?;
        self.mirror_images(message).await
    }

    async fn send_messages(&self, messages: &[Message]) {
        info!("Start writing {} messages to ledger...", messages.len());
        for message in messages {
            if let Err(e) = self.send_message(message).await {
                error!("Error writing message to ledger: {}", e);
                error!("Ledger: {}", self.ledger_path.display());
                error!("Media dir: {}", self.media_dir.display());
                error!("Message: {:?}", message);
            }
        }
        info!("Done writing ledger");
    }
}

/// One CSV record: `user,content,link,update_at`, with `content`
/// escaped as a JSON string literal to keep embedded newlines, commas,
/// and quotes in a single column.
fn record_line(message: &Message) -> Result<String> {
    let content_json = serde_json::to_string(&message.content)?;
    Ok(format!(
        "{},{},{},{}\n",
        csv_field(&message.author),
        csv_field(&content_json),
        csv_field(&message.link),
        message.update_at
    ))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn media_file_name(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RelayError::Parse(format!("image URL {} has no file name", url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_pass_through() {
        assert_eq!(csv_field("singer"), "singer");
    }

    #[test]
    fn fields_with_commas_and_quotes_are_quoted() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn record_line_escapes_content_as_json() {
        let message = Message {
            author: "singer".to_string(),
            content: "line one\nline two, with comma".to_string(),
            link: "https://weibo.com/123/abc".to_string(),
            update_at: 1650508215,
            images: vec![],
        };
        let line = record_line(&message).unwrap();
        assert!(line.starts_with("singer,"));
        assert!(line.ends_with(",https://weibo.com/123/abc,1650508215\n"));
        // The JSON literal keeps the newline inside one column.
        assert!(line.contains("\\n"));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn media_file_name_takes_final_path_segment() {
        assert_eq!(
            media_file_name("https://img.example/a/b/photo.jpg").unwrap(),
            "photo.jpg"
        );
        assert!(media_file_name("https://img.example/").is_err());
    }
}
