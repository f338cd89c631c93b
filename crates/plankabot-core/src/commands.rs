//! Chat command handling.
//!
//! Each invocation is independent: parse, validate, call the board, record
//! the action in the ledger, translate ids, reply. Board and storage errors
//! are caught here and turned into a small set of fixed replies.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    board::{
        port::BoardPort,
        types::{CardDetails, CHECKLIST_POSITION_STEP, POSITION_END, POSITION_TOP},
    },
    config::Config,
    domain::{ActionKind, ChatId, ShortId},
    errors::Error,
    formatting::{chunk_lines, escape_html},
    ledger::BotActionLedger,
    messaging::{port::MessagingPort, types::IncomingCommand},
    short_id::{resolve, ShortIdStore},
    Result,
};

const START_TEXT: &str = "Hi! I am your Planka bot.\nUse /help to see available commands.";

const HELP_TEXT: &str = "Available commands:\n\
/start - Start the bot\n\
/help - Show this help message\n\
/boards - List your Planka boards\n\
/todo {task_name} - Create a task in TODO\n\
/todo - List TODO tasks\n\
/task {id} - Show full task details (title, description, checklist, images)\n\
/doing {id} - Move task to IN PROGRESS\n\
/done {id} - Move task to DONE\n\
/backtodo {id} - Move task back to TODO";

const AUTH_FAILED: &str =
    "Planka authentication failed. Check PLANKA_USERNAME_OR_EMAIL and PLANKA_PASSWORD.";
const REQUEST_FAILED: &str = "Planka request failed. Please try again.";
const STORAGE_UNAVAILABLE: &str = "Task storage is unavailable. Please try again later.";
const LIST_NOT_WRITABLE: &str = "Planka write failed: list is not writable for this account. \
Check PLANKA_*_LIST_ID and ensure your user is a project manager on the board.";

const CHECKLIST_NAME: &str = "Checklist";
const MAX_BOARDS_SHOWN: usize = 20;
const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// The slice of configuration command handling needs.
#[derive(Clone, Debug)]
pub struct CommandSettings {
    pub todo_list_id: String,
    pub doing_list_id: String,
    pub done_list_id: String,
    pub card_type: String,
    /// Whether board credentials were provided at all.
    pub board_configured: bool,
}

impl CommandSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            todo_list_id: cfg.planka_todo_list_id.clone(),
            doing_list_id: cfg.planka_doing_list_id.clone(),
            done_list_id: cfg.planka_done_list_id.clone(),
            card_type: cfg.planka_card_type.clone(),
            board_configured: !cfg.planka_username_or_email.is_empty()
                && !cfg.planka_password.is_empty(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MoveTarget {
    Doing,
    Done,
    BackToTodo,
}

impl MoveTarget {
    fn command(self) -> &'static str {
        match self {
            MoveTarget::Doing => "doing",
            MoveTarget::Done => "done",
            MoveTarget::BackToTodo => "backtodo",
        }
    }

    fn confirmation(self) -> &'static str {
        match self {
            MoveTarget::Doing => "moved to IN PROGRESS",
            MoveTarget::Done => "moved to DONE",
            MoveTarget::BackToTodo => "moved back to TODO",
        }
    }

    /// Forward moves append; going back to todo puts the card on top.
    fn position(self) -> f64 {
        match self {
            MoveTarget::BackToTodo => POSITION_TOP,
            _ => POSITION_END,
        }
    }
}

pub struct CommandProcessor {
    settings: CommandSettings,
    board: Arc<dyn BoardPort>,
    store: Arc<dyn ShortIdStore>,
    ledger: Arc<BotActionLedger>,
    messenger: Arc<dyn MessagingPort>,
}

impl CommandProcessor {
    pub fn new(
        settings: CommandSettings,
        board: Arc<dyn BoardPort>,
        store: Arc<dyn ShortIdStore>,
        ledger: Arc<BotActionLedger>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            settings,
            board,
            store,
            ledger,
            messenger,
        }
    }

    /// Handle one command end to end. Never fails: every outcome is a reply.
    pub async fn handle(&self, cmd: &IncomingCommand) {
        info!(chat_id = cmd.chat_id.0, command = %cmd.name, args = %cmd.args, "received command");

        let result = match cmd.name.as_str() {
            "start" => {
                self.reply(cmd.chat_id, START_TEXT).await;
                Ok(())
            }
            "help" => {
                self.reply(cmd.chat_id, HELP_TEXT).await;
                Ok(())
            }
            "boards" => self.list_boards(cmd).await,
            "todo" if cmd.args.is_empty() => self.list_todo(cmd).await,
            "todo" => self.create_todo(cmd).await,
            "task" => self.show_task(cmd).await,
            "doing" => self.move_task(cmd, MoveTarget::Doing).await,
            "done" => self.move_task(cmd, MoveTarget::Done).await,
            "backtodo" => self.move_task(cmd, MoveTarget::BackToTodo).await,
            other => {
                self.reply(cmd.chat_id, &format!("Unknown command: /{other}. Use /help."))
                    .await;
                Ok(())
            }
        };

        if let Err(e) = result {
            match &e {
                Error::Auth(_) => warn!(command = %cmd.name, error = %e, "board rejected credentials"),
                _ => error!(command = %cmd.name, error = %e, "command failed"),
            }
            self.reply(cmd.chat_id, error_reply(&cmd.name, &e)).await;
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            warn!(chat_id = chat_id.0, error = %e, "failed to send reply");
        }
    }

    async fn list_boards(&self, cmd: &IncomingCommand) -> Result<()> {
        if !self.settings.board_configured {
            self.reply(cmd.chat_id, "Planka integration is not configured yet.")
                .await;
            return Ok(());
        }

        let boards = self.board.list_boards().await?;
        if boards.is_empty() {
            self.reply(cmd.chat_id, "No boards were found for this Planka account.")
                .await;
            return Ok(());
        }

        let lines: Vec<String> = boards
            .iter()
            .take(MAX_BOARDS_SHOWN)
            .map(|b| {
                format!(
                    "- {} (id: {})",
                    b.name.as_deref().unwrap_or("Unnamed board"),
                    b.id
                )
            })
            .collect();
        self.reply(cmd.chat_id, &format!("Your boards:\n{}", lines.join("\n")))
            .await;
        Ok(())
    }

    async fn list_todo(&self, cmd: &IncomingCommand) -> Result<()> {
        let cards = self.board.list_cards(&self.settings.todo_list_id).await?;

        let mut lines = Vec::with_capacity(cards.len());
        for card in cards.iter().filter(|c| !c.id.is_empty()) {
            let short = self.store.get_or_create(&card.id).await?;
            let name = card.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Untitled");
            let mut line = format!("- {short} | {name}");
            if let Some(first) = card
                .description
                .as_deref()
                .and_then(|d| d.lines().map(str::trim).find(|l| !l.is_empty()))
            {
                line.push_str(" - ");
                line.push_str(first);
            }
            lines.push(line);
        }

        if lines.is_empty() {
            self.reply(cmd.chat_id, "TODO list is empty.").await;
            return Ok(());
        }

        let limit = self.messenger.capabilities().max_message_len;
        for chunk in chunk_lines("TODO tasks:\n", &lines, limit) {
            self.reply(cmd.chat_id, &chunk).await;
        }
        Ok(())
    }

    async fn create_todo(&self, cmd: &IncomingCommand) -> Result<()> {
        let (name, items) = parse_todo_args(&cmd.args);

        let card = self
            .board
            .create_card(&self.settings.todo_list_id, &name, &self.settings.card_type)
            .await?;
        if card.id.is_empty() {
            self.reply(cmd.chat_id, "Planka returned an invalid card response.")
                .await;
            return Ok(());
        }

        let short = self.store.get_or_create(&card.id).await?;
        self.ledger
            .register(&card.id, ActionKind::Create, &cmd.user.display_name());

        let mut items_created = 0;
        if !items.is_empty() {
            let task_list = self.board.create_task_list(&card.id, CHECKLIST_NAME).await?;
            if !task_list.id.is_empty() {
                for (idx, item) in items.iter().enumerate() {
                    let position = CHECKLIST_POSITION_STEP * (idx + 1) as f64;
                    self.board.create_task(&task_list.id, item, position).await?;
                    items_created += 1;
                }
            }
        }

        let attached = self.upload_photo(cmd, &card.id).await;
        info!(card_id = %card.id, short_id = %short, items = items_created, attached, "card created");
        self.reply(cmd.chat_id, &build_create_reply(short, items_created, attached))
            .await;
        Ok(())
    }

    /// Best effort: any failure is logged and reported as "not attached".
    async fn upload_photo(&self, cmd: &IncomingCommand, card_id: &str) -> bool {
        let Some(photo) = cmd.photo.as_ref() else {
            return false;
        };

        let bytes = match self.messenger.download_file(&photo.file_id).await {
            Ok(b) if !b.is_empty() => b,
            Ok(_) => {
                warn!(card_id, "downloaded photo is empty, skipping attachment upload");
                return false;
            }
            Err(e) => {
                warn!(card_id, error = %e, "failed to download photo");
                return false;
            }
        };

        let file_name = format!("{}.jpg", photo.file_unique_id);
        match self
            .board
            .create_attachment(card_id, &file_name, bytes, "image/jpeg")
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(card_id, error = %e, "failed to upload photo attachment");
                false
            }
        }
    }

    async fn show_task(&self, cmd: &IncomingCommand) -> Result<()> {
        let Some(input) = first_token(&cmd.args) else {
            self.reply(cmd.chat_id, "Usage: /task {id}").await;
            return Ok(());
        };
        let Some(card_id) = resolve(self.store.as_ref(), input).await? else {
            self.reply(cmd.chat_id, &not_found(input)).await;
            return Ok(());
        };
        let Some(details) = self.board.get_card(&card_id).await? else {
            self.reply(cmd.chat_id, &not_found(input)).await;
            return Ok(());
        };

        if let Err(e) = self
            .messenger
            .send_html(cmd.chat_id, &render_card_details(&details))
            .await
        {
            warn!(card_id = %card_id, error = %e, "failed to send task details");
        }

        for attachment in details.attachments.iter().filter(|a| !a.id.is_empty()) {
            let name = attachment.name.as_deref().unwrap_or("").to_lowercase();
            if !IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
                continue;
            }
            let Some(bytes) = self.board.download_attachment(&attachment.id).await else {
                continue;
            };
            if let Err(e) = self.messenger.send_photo(cmd.chat_id, bytes, &name).await {
                warn!(attachment_id = %attachment.id, error = %e, "failed to send attachment as photo");
            }
        }
        Ok(())
    }

    async fn move_task(&self, cmd: &IncomingCommand, target: MoveTarget) -> Result<()> {
        let Some(input) = first_token(&cmd.args) else {
            self.reply(cmd.chat_id, &format!("Usage: /{} {{id}}", target.command()))
                .await;
            return Ok(());
        };
        let Some(card_id) = resolve(self.store.as_ref(), input).await? else {
            self.reply(cmd.chat_id, &not_found(input)).await;
            return Ok(());
        };

        let list_id = match target {
            MoveTarget::Doing => &self.settings.doing_list_id,
            MoveTarget::Done => &self.settings.done_list_id,
            MoveTarget::BackToTodo => &self.settings.todo_list_id,
        };
        match self.board.move_card(&card_id, list_id, target.position()).await {
            Ok(_) => {}
            Err(Error::NotFound(_)) => {
                self.reply(cmd.chat_id, &not_found(input)).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.ledger
            .register(&card_id, ActionKind::Move, &cmd.user.display_name());
        self.reply(cmd.chat_id, &format!("{input} {}", target.confirmation()))
            .await;
        Ok(())
    }
}

fn first_token(args: &str) -> Option<&str> {
    args.split_whitespace().next()
}

fn not_found(input: &str) -> String {
    format!("Task '{input}' was not found.")
}

/// Fixed user-facing text for a failed command. Raw error text is never
/// shown, except for the list-not-writable hint on `/todo`.
fn error_reply(command: &str, err: &Error) -> &'static str {
    match err {
        Error::Auth(_) => AUTH_FAILED,
        Error::Storage(_) => STORAGE_UNAVAILABLE,
        Error::Api(msg) | Error::NotFound(msg)
            if command == "todo" && msg.contains("List not found") =>
        {
            LIST_NOT_WRITABLE
        }
        _ => REQUEST_FAILED,
    }
}

/// Split `/todo` arguments into the card title (first line) and checklist
/// items (following lines starting with `- `). Other lines are ignored.
pub fn parse_todo_args(args: &str) -> (String, Vec<String>) {
    let mut lines = args.split('\n');
    let name = lines.next().unwrap_or("").trim().to_string();
    let items = lines
        .filter_map(|line| line.trim().strip_prefix("- "))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    (name, items)
}

pub fn build_create_reply(short_id: ShortId, items_count: usize, has_attachment: bool) -> String {
    let mut parts = Vec::new();
    if items_count > 0 {
        let plural = if items_count == 1 { "" } else { "s" };
        parts.push(format!("{items_count} item{plural}"));
    }
    if has_attachment {
        parts.push("1 attachment".to_string());
    }
    if parts.is_empty() {
        format!("task {short_id} created")
    } else {
        format!("task {short_id} created ({})", parts.join(", "))
    }
}

/// Telegram HTML for `/task`: bold title, description, checklists.
pub fn render_card_details(details: &CardDetails) -> String {
    let title = details
        .card
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or("Untitled");
    let mut parts = vec![format!("<b>{}</b>", escape_html(title))];

    let description = details.card.description.as_deref().unwrap_or("").trim();
    if !description.is_empty() {
        parts.push(format!("\n{}", escape_html(description)));
    }

    let mut checklist = Vec::new();
    for list in details.task_lists.iter().filter(|l| !l.id.is_empty()) {
        let list_name = escape_html(list.name.as_deref().unwrap_or(CHECKLIST_NAME));
        let tasks: Vec<_> = details
            .tasks
            .iter()
            .filter(|t| t.task_list_id.as_deref() == Some(list.id.as_str()))
            .collect();
        if tasks.is_empty() {
            checklist.push(format!("• {list_name}: (empty)"));
            continue;
        }
        checklist.push(format!("• {list_name}:"));
        for task in tasks {
            let glyph = if task.is_completed { '☑' } else { '☐' };
            checklist.push(format!(
                "  {glyph} {}",
                escape_html(task.name.as_deref().unwrap_or(""))
            ));
        }
    }
    if !checklist.is_empty() {
        parts.push("\n<b>Checklist:</b>".to_string());
        parts.extend(checklist);
    }

    parts.join("\n")
}
