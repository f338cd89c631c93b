use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use plankabot_core::{
    commands::{CommandProcessor, CommandSettings},
    config::Config,
    ledger::BotActionLedger,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    poller::{ActivityPoller, PollerSettings},
};
use plankabot_planka::PlankaClient;
use plankabot_store::SqliteShortIdStore;
use plankabot_telegram::{router, TelegramMessenger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    plankabot_core::logging::init("plankabot")?;

    let cfg = Arc::new(Config::load()?);

    let planka = Arc::new(PlankaClient::from_config(&cfg)?);
    planka.authenticate().await?;

    let store = Arc::new(SqliteShortIdStore::open(&cfg.database_path)?);

    let telegram = TelegramMessenger::from_token(&cfg.bot_token, cfg.telegram_message_limit);
    let bot = telegram.bot();
    // Throttle outgoing messages; the adapter still retries once on 429.
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        Arc::new(telegram),
        ThrottleConfig::default(),
    ));

    let ledger = Arc::new(BotActionLedger::default());
    let processor = Arc::new(CommandProcessor::new(
        CommandSettings::from_config(&cfg),
        planka.clone(),
        store.clone(),
        ledger.clone(),
        messenger.clone(),
    ));

    let cancel = CancellationToken::new();
    let poller = match PollerSettings::from_config(&cfg) {
        Some(settings) => {
            let poller = ActivityPoller::new(planka.clone(), messenger.clone(), ledger, settings);
            Some(tokio::spawn(poller.run(cancel.clone())))
        }
        None => {
            info!("board notifications disabled (set PLANKA_BOARD_ID and TELEGRAM_NOTIFICATION_CHAT_IDS)");
            None
        }
    };

    let result = router::run(cfg, bot, processor).await;

    // The poller must be gone before the client and store are dropped.
    cancel.cancel();
    if let Some(handle) = poller {
        if let Err(e) = handle.await {
            warn!(error = %e, "activity poller task failed");
        }
    }
    drop(store);
    drop(planka);

    info!("plankabot stopped");
    result
}
