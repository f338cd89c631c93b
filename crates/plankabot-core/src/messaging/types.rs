use crate::domain::{ChatId, ChatUser};

/// A slash command received from chat, already stripped of transport details.
#[derive(Clone, Debug)]
pub struct IncomingCommand {
    pub chat_id: ChatId,
    pub user: ChatUser,
    /// Command name as typed (case kept), without the leading `/` or `@botname`.
    pub name: String,
    /// Everything after the command word, trimmed. May span several lines.
    pub args: String,
    /// Largest size of a photo sent together with the command, if any.
    pub photo: Option<PhotoRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoRef {
    pub file_id: String,
    pub file_unique_id: String,
}

/// Limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}
