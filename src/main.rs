use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;

use kopilka::config::Config;
use kopilka::expenses::{Database, Dialogue, InboundEvent, MalformedEvent, TelegramClient};
use kopilka::telegram_log::TelegramLogLayer;

struct BotState {
    dialogue: Dialogue<Database>,
    telegram: TelegramClient,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "kopilka.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("kopilka.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(TelegramLogLayer::new(bot.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting kopilka...");
    info!("Loaded config from {config_path}");
    info!(
        "{} categories, {} people, timezone {}",
        config.vocabulary.categories.len(),
        config.vocabulary.people.len(),
        config.timezone
    );

    let db_path = config.data_dir.join("expenses.db");
    let db = match Database::load_or_new(&db_path, config.timezone) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open {}: {e}", db_path.display());
            std::process::exit(1);
        }
    };

    let vocabulary = Arc::new(config.vocabulary.clone());
    let state = Arc::new(BotState {
        dialogue: Dialogue::new(vocabulary, db, &config.admin_username, config.timezone),
        telegram: TelegramClient::new(bot.clone()),
    });
    state.telegram.register_commands().await;

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match config.webhook {
        Some(webhook) => {
            let url = match webhook.url.parse() {
                Ok(url) => url,
                Err(e) => {
                    error!("Invalid webhook url {}: {e}", webhook.url);
                    std::process::exit(1);
                }
            };
            let options = webhooks::Options::new(webhook.listen_addr, url);
            let listener = match webhooks::axum(bot, options).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to set up webhook: {e}");
                    std::process::exit(1);
                }
            };
            info!("Receiving updates via webhook on {}", webhook.listen_addr);
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
                )
                .await;
        }
        None => {
            info!("Receiving updates via long polling");
            dispatcher.dispatch().await;
        }
    }
}

/// One inbound message, one reply. Malformed events get no reply.
async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let event = match InboundEvent::from_message(&msg, state.dialogue.vocabulary()) {
        Ok(event) => event,
        Err(e @ MalformedEvent::UnknownSender(_)) => {
            warn!("Ignoring message {} in chat {}: {e}", msg.id, msg.chat.id);
            return Ok(());
        }
        Err(e) => {
            debug!("Ignoring message {}: {e}", msg.id);
            return Ok(());
        }
    };

    let preview: String = event.text.chars().take(100).collect();
    info!("📨 {} (@{}): \"{preview}\"", event.person.name, event.person.username);

    let reply = state.dialogue.respond(&event.person, &event.text);
    // Delivery failures are logged by the client and not retried.
    state.telegram.send_text(event.chat_id, &reply).await.ok();

    Ok(())
}
