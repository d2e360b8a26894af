//! Tracing layer that mirrors the bot's own log lines into an admin chat.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BUFFERED: usize = 50;
const MAX_CHARS: usize = 4000;

enum LogLine {
    Now(String),
    Batched(String),
}

/// Forwards INFO and above from this crate's own targets. WARN and ERROR
/// go out at once; INFO lines are joined and flushed every few seconds.
pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
    target_prefix: &'static str,
}

impl TelegramLogLayer {
    /// Must be called inside a tokio runtime.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogLine>();

        tokio::spawn(async move {
            let mut buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(LogLine::Now(text)) => send_log(&bot, chat_id, &text).await,
                        Some(LogLine::Batched(text)) => {
                            buffer.push(text);
                            if buffer.len() >= MAX_BUFFERED {
                                flush(&bot, chat_id, &mut buffer).await;
                            }
                        }
                        None => {
                            flush(&bot, chat_id, &mut buffer).await;
                            break;
                        }
                    },
                    _ = interval.tick() => flush(&bot, chat_id, &mut buffer).await,
                }
            }
        });

        Self {
            tx,
            target_prefix: env!("CARGO_CRATE_NAME"),
        }
    }
}

async fn send_log(bot: &Bot, chat_id: ChatId, text: &str) {
    let text: String = text.chars().take(MAX_CHARS).collect();
    if let Err(e) = bot.send_message(chat_id, text).await {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

async fn flush(bot: &Bot, chat_id: ChatId, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let combined = buffer.join("\n");
    buffer.clear();
    send_log(bot, chat_id, &combined).await;
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if level > Level::INFO || !metadata.target().starts_with(self.target_prefix) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = match level {
            Level::ERROR => LogLine::Now(format!("❌ {}", visitor.message)),
            Level::WARN => LogLine::Now(format!("⚠️ {}", visitor.message)),
            _ => LogLine::Batched(visitor.message),
        };

        if self.tx.send(line).is_err() {
            eprintln!("Log channel closed, line dropped");
        }
    }
}
