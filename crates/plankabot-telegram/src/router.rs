use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    update_listeners::webhooks,
};
use tracing::{info, warn};

use plankabot_core::{
    commands::CommandProcessor,
    config::{Config, WebhookConfig},
};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<CommandProcessor>,
    /// Our own username; `/cmd@name` is only accepted when `name` matches.
    pub bot_username: Option<String>,
}

/// Receive updates until Ctrl-C. Long polling by default, or a webhook
/// server when `WEBHOOK_URL` is configured.
pub async fn run(cfg: Arc<Config>, bot: Bot, processor: Arc<CommandProcessor>) -> anyhow::Result<()> {
    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!(username = %me.username(), "telegram bot connected");
            Some(me.username().to_string())
        }
        Err(e) => {
            warn!(error = %e, "could not fetch bot info, ignoring @mentioned commands");
            None
        }
    };

    let state = Arc::new(AppState {
        processor,
        bot_username,
    });
    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build();

    match cfg.webhook.as_ref() {
        None => {
            // A leftover webhook makes getUpdates fail.
            bot.delete_webhook().await?;
            info!("receiving updates via long polling");
            dispatcher.dispatch().await;
        }
        Some(webhook) => {
            let listener = webhooks::axum(bot, webhook_options(webhook)?).await?;
            info!(addr = %webhook.listen_addr, url = %webhook.url, "receiving updates via webhook");
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("webhook update listener error"),
                )
                .await;
        }
    }

    info!("update dispatcher stopped");
    Ok(())
}

/// Telegram sends the secret in `X-Telegram-Bot-Api-Secret-Token`; the
/// listener answers 401 to requests without a matching header.
fn webhook_options(webhook: &WebhookConfig) -> anyhow::Result<webhooks::Options> {
    let url: reqwest::Url = webhook
        .url
        .parse()
        .map_err(|e| anyhow::anyhow!("WEBHOOK_URL is invalid ({}): {e}", webhook.url))?;
    Ok(webhooks::Options::new(webhook.listen_addr, url).secret_token(webhook.secret.clone()))
}
