use async_trait::async_trait;

use crate::{
    domain::{ChatId, NotificationTarget},
    messaging::types::MessagingCapabilities,
    Result,
};

/// Cross-messenger port used by command handling and the activity poller.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Plain text, no markup parsing.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()>;

    async fn send_photo(&self, chat_id: ChatId, bytes: Vec<u8>, file_name: &str) -> Result<()>;

    /// HTML message to a configured notification target (chat + optional thread).
    async fn send_notification(&self, target: &NotificationTarget, html: &str) -> Result<()>;

    /// Fetch the bytes of a file previously sent to the bot.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}
