//! Telegram update handlers.
//!
//! Every slash command (in message text or in a photo caption) is converted
//! into a transport-free `IncomingCommand` and handed to the core processor.
//! Non-command messages are ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use plankabot_core::{
    domain::{ChatId, ChatUser},
    messaging::types::{IncomingCommand, PhotoRef},
};

use crate::router::AppState;

/// Split `/cmd@botname args...` into the command name and the trimmed
/// remainder. The remainder keeps its inner newlines.
///
/// Command names are case-sensitive. A `@mention` must name this bot
/// (`bot_username`, compared case-insensitively like Telegram usernames);
/// commands addressed to any other bot, or mentions we cannot verify, give
/// `None`.
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<(String, String)> {
    let text = text.trim();
    let (first, rest) = match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (text, ""),
    };

    let word = first.strip_prefix('/')?;
    let cmd = match word.split_once('@') {
        Some((cmd, mention)) => {
            let ours = bot_username
                .map(|me| me.trim_start_matches('@').eq_ignore_ascii_case(mention))
                .unwrap_or(false);
            if !ours {
                return None;
            }
            cmd
        }
        None => word,
    };
    if cmd.is_empty() {
        return None;
    }

    Some((cmd.to_string(), rest.to_string()))
}

pub fn incoming_command(msg: &Message, bot_username: Option<&str>) -> Option<IncomingCommand> {
    let text = msg.text().or_else(|| msg.caption())?;
    let (name, args) = parse_command(text, bot_username)?;

    let user = msg
        .from()
        .map(|u| ChatUser {
            username: u.username.clone(),
            first_name: Some(u.first_name.clone()),
        })
        .unwrap_or_default();

    // Telegram sends several sizes; the last one is the largest.
    let photo = msg.photo().and_then(|sizes| sizes.last()).map(|p| PhotoRef {
        file_id: p.file.id.clone(),
        file_unique_id: p.file.unique_id.clone(),
    });

    Some(IncomingCommand {
        chat_id: ChatId(msg.chat.id.0),
        user,
        name,
        args,
        photo,
    })
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(cmd) = incoming_command(&msg, state.bot_username.as_deref()) {
        state.processor.handle(&cmd).await;
    }
    Ok(())
}
