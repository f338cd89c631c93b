//! Short-lived record of board actions the bridge performed itself.
//!
//! Command handlers register an entry right after mutating the board; the
//! activity poller consumes it when the same action shows up in the feed and
//! uses the stored chat user as the notification author. Expired entries are
//! dropped lazily on read, so no sweeper task is needed.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::domain::ActionKind;

/// How long a registered action waits for the poller before it is ignored.
pub const BOT_ACTION_TTL: Duration = Duration::from_secs(120);

#[derive(Clone, Debug)]
struct Entry {
    recorded_at: Instant,
    actor: String,
}

#[derive(Debug)]
pub struct BotActionLedger {
    ttl: Duration,
    entries: Mutex<HashMap<(String, ActionKind), Entry>>,
}

impl Default for BotActionLedger {
    fn default() -> Self {
        Self::new(BOT_ACTION_TTL)
    }
}

impl BotActionLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record (or overwrite) the action for `(card_id, kind)`.
    pub fn register(&self, card_id: &str, kind: ActionKind, actor: &str) {
        self.register_at(card_id, kind, actor, Instant::now());
    }

    pub fn register_at(&self, card_id: &str, kind: ActionKind, actor: &str, now: Instant) {
        self.lock().insert(
            (card_id.to_string(), kind),
            Entry {
                recorded_at: now,
                actor: actor.to_string(),
            },
        );
    }

    /// Remove the entry for `(card_id, kind)` and return its actor if it was
    /// still fresh. Read-once: a second call returns `None`.
    pub fn consume_if_present(&self, card_id: &str, kind: ActionKind) -> Option<String> {
        self.consume_at(card_id, kind, Instant::now())
    }

    pub fn consume_at(&self, card_id: &str, kind: ActionKind, now: Instant) -> Option<String> {
        let entry = self.lock().remove(&(card_id.to_string(), kind))?;
        if now.saturating_duration_since(entry.recorded_at) > self.ttl {
            return None;
        }
        Some(entry.actor)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, ActionKind), Entry>> {
        // The map holds no invariants a panicking writer could break.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
