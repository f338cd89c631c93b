use std::{
    collections::HashSet,
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::NotificationTarget, errors::Error, Result};

/// Typed configuration for the bridge.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub telegram_message_limit: usize,
    pub webhook: Option<WebhookConfig>,

    // Short-id storage
    pub database_path: PathBuf,

    // Planka
    pub planka_base_url: String,
    pub planka_username_or_email: String,
    pub planka_password: String,
    pub planka_card_type: String,
    pub planka_todo_list_id: String,
    pub planka_doing_list_id: String,
    pub planka_done_list_id: String,
    pub planka_request_timeout: Duration,

    // Notifications
    pub notification_targets: Vec<NotificationTarget>,
    pub planka_board_id: Option<String>,
    pub planka_board_display_name: String,
    pub poll_interval: Duration,
}

/// Push-mode settings. When absent the bot uses long polling.
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: String,
    pub listen_addr: SocketAddr,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process environment
    /// in production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                Error::Config(format!("{key} environment variable is required"))
            })
        };

        let bot_token = require("BOT_TOKEN")?;
        let planka_base_url = require("PLANKA_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let planka_username_or_email = require("PLANKA_USERNAME_OR_EMAIL")?;
        let planka_password = require("PLANKA_PASSWORD")?;
        let planka_todo_list_id = require("PLANKA_TODO_LIST_ID")?;
        let planka_doing_list_id = require("PLANKA_DOING_LIST_ID")?;
        let planka_done_list_id = require("PLANKA_DONE_LIST_ID")?;

        let planka_card_type = get("PLANKA_CARD_TYPE").unwrap_or_else(|| "project".to_string());
        let planka_request_timeout = duration_secs(
            get("PLANKA_REQUEST_TIMEOUT_SECONDS"),
            Duration::from_secs(10),
            "PLANKA_REQUEST_TIMEOUT_SECONDS",
        )?;

        let database_path = PathBuf::from(
            get("DATABASE_PATH").unwrap_or_else(|| "plankabot.sqlite3".to_string()),
        );

        let notification_targets = parse_notification_targets(
            get("TELEGRAM_NOTIFICATION_CHAT_IDS")
                .or_else(|| get("TELEGRAM_NOTIFICATION_CHAT_ID"))
                .as_deref(),
        );
        let planka_board_id = get("PLANKA_BOARD_ID");
        let planka_board_display_name =
            get("PLANKA_BOARD_DISPLAY_NAME").unwrap_or_else(|| "TASKS".to_string());
        let poll_interval = duration_secs(
            get("PLANKA_POLL_INTERVAL_SECONDS"),
            Duration::from_secs(5),
            "PLANKA_POLL_INTERVAL_SECONDS",
        )?;

        let telegram_message_limit = get("TELEGRAM_MESSAGE_LIMIT")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(4096);

        let webhook = match get("WEBHOOK_URL") {
            None => None,
            Some(url) => {
                let secret = require("WEBHOOK_SECRET")?;
                validate_webhook_secret(&secret)?;
                let raw_addr =
                    get("WEBHOOK_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
                let listen_addr = raw_addr.trim().parse::<SocketAddr>().map_err(|e| {
                    Error::Config(format!("WEBHOOK_LISTEN_ADDR is invalid ({raw_addr}): {e}"))
                })?;
                Some(WebhookConfig {
                    url,
                    secret,
                    listen_addr,
                })
            }
        };

        Ok(Self {
            bot_token,
            telegram_message_limit,
            webhook,
            database_path,
            planka_base_url,
            planka_username_or_email,
            planka_password,
            planka_card_type,
            planka_todo_list_id,
            planka_doing_list_id,
            planka_done_list_id,
            planka_request_timeout,
            notification_targets,
            planka_board_id,
            planka_board_display_name,
            poll_interval,
        })
    }

    /// Chats the poller is allowed to message. Fixed for the process lifetime.
    pub fn allowed_chat_ids(&self) -> HashSet<String> {
        self.notification_targets
            .iter()
            .map(|t| t.chat_id.clone())
            .collect()
    }
}

/// Parse `chat` / `chat:thread` pairs separated by commas.
///
/// A part whose thread suffix is not an integer is kept whole as a chat id.
pub fn parse_notification_targets(raw: Option<&str>) -> Vec<NotificationTarget> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once(':') {
            Some((chat, thread)) => match thread.trim().parse::<i32>() {
                Ok(t) => NotificationTarget::new(chat.trim(), Some(t)),
                Err(_) => NotificationTarget::new(part, None),
            },
            None => NotificationTarget::new(part, None),
        })
        .collect()
}

/// Telegram accepts 1..=256 characters from `A-Z a-z 0-9 _ -`.
fn validate_webhook_secret(secret: &str) -> Result<()> {
    if secret.is_empty() || secret.len() > 256 {
        return Err(Error::Config(
            "WEBHOOK_SECRET must be 1-256 characters long".to_string(),
        ));
    }
    if !secret
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(Error::Config(
            "WEBHOOK_SECRET may only contain A-Z, a-z, 0-9, `_` and `-`".to_string(),
        ));
    }
    Ok(())
}

fn duration_secs(raw: Option<String>, default: Duration, key: &str) -> Result<Duration> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let secs = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| Error::Config(format!("{key} must be a number of seconds: {e}")))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::Config(format!("{key} must be positive")));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("BOT_TOKEN", "123:abc"),
            ("PLANKA_BASE_URL", "https://planka.example.com/"),
            ("PLANKA_USERNAME_OR_EMAIL", "bot@example.com"),
            ("PLANKA_PASSWORD", "secret"),
            ("PLANKA_TODO_LIST_ID", "todo-list"),
            ("PLANKA_DOING_LIST_ID", "doing-list"),
            ("PLANKA_DONE_LIST_ID", "done-list"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn applies_defaults() {
        let cfg = load(&base_env()).unwrap();
        assert_eq!(cfg.planka_base_url, "https://planka.example.com");
        assert_eq!(cfg.planka_card_type, "project");
        assert_eq!(cfg.planka_request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.planka_board_display_name, "TASKS");
        assert_eq!(cfg.telegram_message_limit, 4096);
        assert!(cfg.notification_targets.is_empty());
        assert!(cfg.planka_board_id.is_none());
        assert!(cfg.webhook.is_none());
    }

    #[test]
    fn missing_required_value_is_config_error() {
        let mut env = base_env();
        env.remove("PLANKA_DOING_LIST_ID");
        let err = load(&env).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("PLANKA_DOING_LIST_ID")));
    }

    #[test]
    fn parses_targets_with_threads() {
        let targets = parse_notification_targets(Some("-1001, -1002:15 ,@ops:general,,"));
        assert_eq!(
            targets,
            vec![
                NotificationTarget::new("-1001", None),
                NotificationTarget::new("-1002", Some(15)),
                NotificationTarget::new("@ops:general", None),
            ]
        );
    }

    #[test]
    fn single_chat_id_is_a_fallback() {
        let mut env = base_env();
        env.insert("TELEGRAM_NOTIFICATION_CHAT_ID", "-42");
        let cfg = load(&env).unwrap();
        assert_eq!(cfg.notification_targets, vec![NotificationTarget::new("-42", None)]);

        env.insert("TELEGRAM_NOTIFICATION_CHAT_IDS", "-1:2,-3");
        let cfg = load(&env).unwrap();
        assert_eq!(cfg.notification_targets.len(), 2);
        assert_eq!(
            cfg.allowed_chat_ids(),
            HashSet::from(["-1".to_string(), "-3".to_string()])
        );
    }

    #[test]
    fn webhook_requires_valid_secret() {
        let mut env = base_env();
        env.insert("WEBHOOK_URL", "https://bot.example.com/telegram/webhook");
        assert!(matches!(load(&env), Err(Error::Config(_))));

        env.insert("WEBHOOK_SECRET", "not valid!");
        assert!(matches!(load(&env), Err(Error::Config(_))));

        env.insert("WEBHOOK_SECRET", "s3cret_token-1");
        let cfg = load(&env).unwrap();
        let hook = cfg.webhook.unwrap();
        assert_eq!(hook.secret, "s3cret_token-1");
        assert_eq!(hook.listen_addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn rejects_non_positive_intervals() {
        let mut env = base_env();
        env.insert("PLANKA_POLL_INTERVAL_SECONDS", "0");
        assert!(matches!(load(&env), Err(Error::Config(_))));

        env.insert("PLANKA_POLL_INTERVAL_SECONDS", "2.5");
        let cfg = load(&env).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_millis(2500));
    }
}
