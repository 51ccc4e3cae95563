use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use weibo_relay::{
    Dispatcher, LedgerConfig, LedgerSink, RelayConfig, SourceConfig, TelegramConfig, TelegramSink,
    WatermarkStore, WeiboClient,
};

/// Polls Weibo feeds and relays new posts to the configured sinks.
#[derive(Parser, Debug)]
#[command(name = "weibo-relay")]
struct Cli {
    /// Feed ids to track (colon-separated in the env form).
    #[arg(long, env = "CONFIG_WEIBO_IDS", value_delimiter = ':')]
    feed_ids: Vec<u64>,

    /// Telegram bot token; the Telegram sink is enabled when set.
    #[arg(long, env = "CONFIG_TG_TOKEN", default_value = "")]
    telegram_token: String,

    /// Telegram chat id to deliver notifications to.
    #[arg(long, env = "CONFIG_TG_CHAT", default_value_t = 0)]
    telegram_chat: i64,

    /// Ledger root directory; the ledger sink is enabled when set.
    #[arg(long, env = "CONFIG_LEDGER_DIR")]
    ledger_dir: Option<PathBuf>,

    /// Directory for per-feed watermark files.
    #[arg(long, env = "CONFIG_STATE_DIR", default_value = "data/state")]
    state_dir: PathBuf,

    /// Politeness pause between feeds, in seconds.
    #[arg(long, env = "CONFIG_FEED_PAUSE", default_value_t = 15)]
    feed_pause: u64,

    /// Repeat the full pass every N seconds instead of exiting after
    /// one pass (the default suits an external scheduler).
    #[arg(long, env = "CONFIG_INTERVAL")]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let relay_config = RelayConfig {
        feed_ids: cli.feed_ids.clone(),
        state_dir: cli.state_dir.clone(),
        feed_pause_seconds: cli.feed_pause,
    };
    // The only fatal startup condition: nothing to poll.
    relay_config
        .validate()
        .context("set CONFIG_WEIBO_IDS to a colon-separated list of feed ids")?;

    let source = WeiboClient::new(SourceConfig::default());
    let watermarks = WatermarkStore::new(&relay_config.state_dir);
    let mut dispatcher = Dispatcher::new(Box::new(source), watermarks)
        .with_feed_pause(Duration::from_secs(relay_config.feed_pause_seconds));

    if !cli.telegram_token.trim().is_empty() {
        let config = TelegramConfig::new(cli.telegram_token.clone(), cli.telegram_chat);
        match TelegramSink::new(config) {
            Ok(sink) => dispatcher.add_sink(Box::new(sink)),
            Err(e) => error!("Telegram sink disabled: {}", e),
        }
    }

    if let Some(dir) = &cli.ledger_dir {
        match LedgerSink::new(LedgerConfig::new(dir)) {
            Ok(sink) => dispatcher.add_sink(Box::new(sink)),
            Err(e) => error!("Ledger sink disabled: {}", e),
        }
    }

    if dispatcher.sink_count() == 0 {
        warn!("No sinks enabled; cycles will only advance watermarks");
    }

    info!(
        "Relaying {} feeds with {} sinks",
        relay_config.feed_ids.len(),
        dispatcher.sink_count()
    );

    loop {
        dispatcher.run_all(&relay_config.feed_ids).await;
        match cli.interval {
            Some(secs) => {
                info!("Sleeping {}s until the next pass", secs);
                tokio::time::sleep(Duration::from_secs(secs)).await;
            }
            None => break,
        }
    }

    Ok(())
}
