//! Background poller turning the board activity feed into chat notifications.
//!
//! State is a single optional cursor (the newest feed id already handled).
//! The first successful fetch only establishes the cursor, so a restart never
//! replays old history. Each later cycle handles feed items newer than the
//! cursor, newest first, and then moves the cursor to the newest id seen.

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    board::{
        port::BoardPort,
        types::{Action, FeedUser},
    },
    config::Config,
    domain::{ActionKind, NotificationTarget},
    errors::Error,
    ledger::BotActionLedger,
    messaging::port::MessagingPort,
    notify::{render_action, NotifyContext},
    Result,
};

#[derive(Clone, Debug)]
pub struct PollerSettings {
    pub board_id: String,
    pub targets: Vec<NotificationTarget>,
    /// Hard boundary: chats outside this set are never messaged.
    pub allowed_chat_ids: HashSet<String>,
    pub interval: Duration,
    pub notify: NotifyContext,
}

impl PollerSettings {
    /// `None` when notifications are not configured (no targets or no board).
    pub fn from_config(cfg: &Config) -> Option<Self> {
        let board_id = cfg.planka_board_id.clone()?;
        if cfg.notification_targets.is_empty() {
            return None;
        }
        Some(Self {
            board_id,
            targets: cfg.notification_targets.clone(),
            allowed_chat_ids: cfg.allowed_chat_ids(),
            interval: cfg.poll_interval,
            notify: NotifyContext {
                base_url: cfg.planka_base_url.clone(),
                board_name: cfg.planka_board_display_name.clone(),
            },
        })
    }
}

/// Outcome of one poll cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct PollReport {
    /// The cursor was established this cycle; nothing was sent.
    pub(crate) baseline: bool,
    /// Notifiable actions handled this cycle, in processing order.
    pub(crate) notified: Vec<String>,
    /// Newer actions skipped because their type is not notifiable.
    pub(crate) skipped: usize,
}

pub struct ActivityPoller {
    board: Arc<dyn BoardPort>,
    messenger: Arc<dyn MessagingPort>,
    ledger: Arc<BotActionLedger>,
    settings: PollerSettings,
    cursor: Option<String>,
}

impl ActivityPoller {
    pub fn new(
        board: Arc<dyn BoardPort>,
        messenger: Arc<dyn MessagingPort>,
        ledger: Arc<BotActionLedger>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            board,
            messenger,
            ledger,
            settings,
            cursor: None,
        }
    }

    /// Start from a known cursor instead of a cold start.
    #[cfg(test)]
    pub(crate) fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub(crate) fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Run one fetch-and-dispatch cycle.
    ///
    /// Delivery failures are logged per target and never fail the cycle; only
    /// a failed feed fetch returns an error (and leaves the cursor untouched).
    pub(crate) async fn poll_once(&mut self) -> Result<PollReport> {
        let page = self
            .board
            .activity_feed(&self.settings.board_id, None)
            .await?;

        let newest = page
            .items
            .iter()
            .find(|a| !a.id.is_empty())
            .map(|a| a.id.clone());

        let Some(cursor) = self.cursor.clone() else {
            if let Some(newest) = newest {
                info!(cursor = %newest, "activity poller baseline established");
                self.cursor = Some(newest);
                return Ok(PollReport {
                    baseline: true,
                    ..Default::default()
                });
            }
            return Ok(PollReport::default());
        };

        let mut report = PollReport::default();
        for action in page.items.iter().filter(|a| !a.id.is_empty()) {
            if !is_newer(&action.id, &cursor) {
                break;
            }
            let Some(kind) = ActionKind::from_feed_type(&action.kind) else {
                report.skipped += 1;
                continue;
            };
            self.dispatch(action, kind, &page.users).await;
            report.notified.push(action.id.clone());
        }

        if let Some(newest) = newest.filter(|n| is_newer(n, &cursor)) {
            debug!(from = %cursor, to = %newest, "activity cursor advanced");
            self.cursor = Some(newest);
        }
        Ok(report)
    }

    async fn dispatch(&self, action: &Action, kind: ActionKind, users: &[FeedUser]) {
        let author_override = action
            .card_id
            .as_deref()
            .and_then(|card_id| self.ledger.consume_if_present(card_id, kind));

        let Some(html) = render_action(
            &self.settings.notify,
            action,
            users,
            author_override.as_deref(),
        ) else {
            return;
        };

        for target in &self.settings.targets {
            if !self.settings.allowed_chat_ids.contains(&target.chat_id) {
                warn!(target = %target, "refusing to notify unconfigured chat");
                continue;
            }
            if let Err(e) = self.messenger.send_notification(target, &html).await {
                error!(action_id = %action.id, target = %target, error = %e, "failed to send notification");
            }
        }
    }

    /// Poll until `cancel` fires. Never returns early on errors.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut allowed: Vec<_> = self.settings.allowed_chat_ids.iter().cloned().collect();
        allowed.sort();
        info!(
            board_id = %self.settings.board_id,
            interval_ms = self.settings.interval.as_millis() as u64,
            chats = ?allowed,
            "activity poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.poll_once() => match res {
                    Ok(report) => debug!(
                        baseline = report.baseline,
                        notified = report.notified.len(),
                        skipped = report.skipped,
                        "activity poll cycle finished"
                    ),
                    Err(e @ Error::Auth(_)) => error!(error = %e, "activity poller cannot authenticate"),
                    Err(e) if e.is_retryable() => warn!(error = %e, "activity poller fetch failed"),
                    Err(e) => error!(error = %e, "activity poller fetch failed"),
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.settings.interval) => {}
            }
        }

        info!(cursor = ?self.cursor(), "activity poller stopped");
    }
}

/// Planka ids are snowflake-like: a larger number is newer. Equal is not newer.
/// Non-numeric ids fall back to "different means newer".
fn is_newer(id: &str, cursor: &str) -> bool {
    match (id.parse::<u128>(), cursor.parse::<u128>()) {
        (Ok(a), Ok(b)) => a > b,
        _ => id != cursor,
    }
}
