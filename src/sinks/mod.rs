pub mod ledger;
pub mod telegram;

pub use ledger::LedgerSink;
pub use telegram::TelegramSink;

use crate::types::{Message, Result};
use async_trait::async_trait;
use tracing::{error, info};

/// A delivery target that consumes a batch of messages. Sinks are
/// best-effort: a failure on one message is logged and never stops the
/// rest of the batch, and nothing propagates to the dispatcher.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Identity used in logs.
    fn name(&self) -> &str;

    async fn send_message(&self, message: &Message) -> Result<()>;

    async fn send_messages(&self, messages: &[Message]) {
        info!(
            "Start sending {} messages to {}",
            messages.len(),
            self.name()
        );
        for message in messages {
            if let Err(e) = self.send_message(message).await {
                error!("Error sending message to {}: {}", self.name(), e);
                error!("Message: {:?}", message);
            }
        }
        info!("Done sending messages to {}", self.name());
    }
}
