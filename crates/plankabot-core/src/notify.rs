//! Telegram HTML rendering of board activity.

use crate::{
    board::types::{Action, FeedUser, ListRef},
    domain::ActionKind,
    formatting::escape_html,
};

/// Static parts of every notification.
#[derive(Clone, Debug)]
pub struct NotifyContext {
    pub base_url: String,
    pub board_name: String,
}

/// Feed user display name: `name`, then `username`, else `Unknown`.
pub fn resolve_author(user_id: Option<&str>, users: &[FeedUser]) -> String {
    let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
        return "Unknown".to_string();
    };
    users
        .iter()
        .find(|u| u.id == user_id)
        .and_then(|u| {
            u.name
                .clone()
                .filter(|n| !n.is_empty())
                .or_else(|| u.username.clone().filter(|n| !n.is_empty()))
        })
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn card_url(base_url: &str, card_id: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    match card_id.filter(|id| !id.is_empty()) {
        Some(id) => format!("{base}/cards/{id}"),
        None => base.to_string(),
    }
}

/// Card name as clickable text, URL hidden.
fn card_link(card_name: &str, url: &str) -> String {
    format!(
        r#"<a href="{}">{}</a>"#,
        escape_html(url),
        escape_html(card_name)
    )
}

fn list_name(list: Option<&ListRef>) -> Option<&str> {
    list.and_then(|l| l.name.as_deref()).filter(|n| !n.is_empty())
}

/// Render a feed action. `None` for action types we do not notify about.
///
/// `author_override` replaces the feed's user attribution; it carries the
/// chat user behind a bridge-originated action.
pub fn render_action(
    ctx: &NotifyContext,
    action: &Action,
    users: &[FeedUser],
    author_override: Option<&str>,
) -> Option<String> {
    let kind = ActionKind::from_feed_type(&action.kind)?;

    let author = match author_override {
        Some(a) => a.to_string(),
        None => resolve_author(action.user_id.as_deref(), users),
    };
    let author = escape_html(&author);
    let card_name = action
        .card_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or("Untitled");
    let link = card_link(card_name, &card_url(&ctx.base_url, action.card_id.as_deref()));
    let board = escape_html(&ctx.board_name);

    let text = match kind {
        ActionKind::Create => {
            let to = list_name(action.to_list.as_ref())
                .or_else(|| list_name(action.list.as_ref()))
                .unwrap_or("?");
            format!(
                "Card Created\n\n{author} created {link} in {} on {board}",
                escape_html(to)
            )
        }
        ActionKind::Move => {
            let from = list_name(action.from_list.as_ref()).unwrap_or("?");
            let to_trash = action.to_list.as_ref().map(ListRef::is_trash).unwrap_or(false);
            let to = match list_name(action.to_list.as_ref()) {
                Some(name) if !to_trash => name,
                _ => "Trash",
            };
            format!(
                "Card Moved\n\n{author} moved {link} from {} to {} on {board}",
                escape_html(from),
                escape_html(to)
            )
        }
    };
    Some(text)
}
