//! Short numeric ids for long Planka card ids.
//!
//! The durable mapping lives behind [`ShortIdStore`]; the SQLite adapter is in
//! `plankabot-store`. [`resolve`] turns user input into a card id.

use async_trait::async_trait;

use crate::{domain::ShortId, Result};

/// Planka ids are snowflake-like and always at least this many digits long.
/// Anything shorter is a short id. Changing this breaks previously issued ids.
pub const NATIVE_ID_MIN_DIGITS: usize = 16;

/// Durable bijection between long card ids and sequential short ids.
#[async_trait]
pub trait ShortIdStore: Send + Sync {
    /// Insert-or-fetch in one atomic statement. Concurrent callers racing on
    /// the same `long_id` must all observe the same short id.
    async fn get_or_create(&self, long_id: &str) -> Result<ShortId>;

    async fn get_long_id(&self, short_id: ShortId) -> Result<Option<String>>;
}

/// How a user-supplied token refers to a card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CardRef {
    Native(String),
    Short(ShortId),
}

impl CardRef {
    /// Classify a token without touching storage. `None` means the token is
    /// not a valid reference in either scheme.
    pub fn parse(token: &str) -> Option<Self> {
        let candidate = token.trim();
        if candidate.is_empty() || !candidate.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if candidate.len() >= NATIVE_ID_MIN_DIGITS {
            return Some(CardRef::Native(candidate.to_string()));
        }
        candidate.parse::<i64>().ok().map(|n| CardRef::Short(ShortId(n)))
    }
}

/// Resolve a user token to a long card id.
pub async fn resolve(store: &dyn ShortIdStore, token: &str) -> Result<Option<String>> {
    match CardRef::parse(token) {
        None => Ok(None),
        Some(CardRef::Native(id)) => Ok(Some(id)),
        Some(CardRef::Short(short)) => store.get_long_id(short).await,
    }
}
