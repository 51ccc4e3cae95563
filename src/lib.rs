pub mod config;
pub mod dispatcher;
pub mod normalize;
pub mod sinks;
pub mod source;
pub mod text;
pub mod types;
pub mod watermark;

pub use config::{LedgerConfig, RelayConfig, SourceConfig, TelegramConfig};
pub use dispatcher::Dispatcher;
pub use sinks::{LedgerSink, Sink, TelegramSink};
pub use source::{PostSource, WeiboClient};
pub use types::{Message, RawPost, RelayError, Result};
pub use watermark::WatermarkStore;
