use std::fmt;

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Small sequential surrogate for a long Planka card id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortId(pub i64);

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A configured destination for board notifications.
///
/// `chat_id` is kept as the raw configured string: numeric ids and
/// `@channel` usernames are both valid Telegram recipients.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NotificationTarget {
    pub chat_id: String,
    pub thread_id: Option<i32>,
}

impl NotificationTarget {
    pub fn new(chat_id: impl Into<String>, thread_id: Option<i32>) -> Self {
        Self {
            chat_id: chat_id.into(),
            thread_id,
        }
    }
}

impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.thread_id {
            Some(t) => write!(f, "{}:{t}", self.chat_id),
            None => write!(f, "{}", self.chat_id),
        }
    }
}

/// Board mutations the bridge performs itself and notifies about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Create,
    Move,
}

impl ActionKind {
    /// Planka activity-feed type string.
    pub fn as_feed_type(self) -> &'static str {
        match self {
            ActionKind::Create => "createCard",
            ActionKind::Move => "moveCard",
        }
    }

    pub fn from_feed_type(s: &str) -> Option<Self> {
        match s {
            "createCard" => Some(ActionKind::Create),
            "moveCard" => Some(ActionKind::Move),
            _ => None,
        }
    }
}

/// The chat user who issued a command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatUser {
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl ChatUser {
    /// Display name used to attribute board actions: `@handle`, then first
    /// name, then a generic placeholder.
    pub fn display_name(&self) -> String {
        if let Some(u) = self.username.as_deref().filter(|u| !u.trim().is_empty()) {
            return format!("@{u}");
        }
        if let Some(n) = self.first_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return n.to_string();
        }
        "Someone".to_string()
    }
}
