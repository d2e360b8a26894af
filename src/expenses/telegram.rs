//! Telegram side of the bot: inbound events and outbound replies.

use std::fmt;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::classifier::Command;
use crate::config::{Person, Vocabulary};

/// Telegram rejects longer messages.
const MAX_MESSAGE_CHARS: usize = 4096;

/// An inbound message that cannot be handled. Acknowledged without reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedEvent {
    NoSender,
    NoText,
    UnknownSender(String),
}

impl fmt::Display for MalformedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSender => write!(f, "message has no sender username"),
            Self::NoText => write!(f, "message has no text"),
            Self::UnknownSender(username) => write!(f, "sender @{} is not in people", username),
        }
    }
}

impl std::error::Error for MalformedEvent {}

/// A text message from a known person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub person: Person,
    /// Text with any leading `/` command marker removed.
    pub text: String,
}

impl InboundEvent {
    pub fn new(
        chat_id: ChatId,
        username: Option<&str>,
        text: Option<&str>,
        vocabulary: &Vocabulary,
    ) -> Result<Self, MalformedEvent> {
        let username = username.ok_or(MalformedEvent::NoSender)?;
        let text = text.ok_or(MalformedEvent::NoText)?;
        let person = vocabulary
            .person_for(username)
            .ok_or_else(|| MalformedEvent::UnknownSender(username.to_string()))?;

        Ok(Self {
            chat_id,
            person: person.clone(),
            text: strip_command_marker(text),
        })
    }

    pub fn from_message(msg: &Message, vocabulary: &Vocabulary) -> Result<Self, MalformedEvent> {
        let username = msg.from.as_ref().and_then(|u| u.username.as_deref());
        Self::new(msg.chat.id, username, msg.text(), vocabulary)
    }
}

/// `/stats@kopilka_bot` → `stats`
fn strip_command_marker(text: &str) -> String {
    let text = text.trim();
    match text.strip_prefix('/') {
        Some(command) => {
            let command = command.trim_start_matches('/');
            match command.split_once('@') {
                Some((name, _bot)) if !name.contains(char::is_whitespace) => name.to_string(),
                _ => command.to_string(),
            }
        }
        None => text.to_string(),
    }
}

/// Outbound Telegram client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send a plain-text reply. Failures are logged, not retried.
    pub async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), String> {
        let text = truncate_chars(text, MAX_MESSAGE_CHARS);
        self.bot
            .send_message(chat_id, text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Publish the command list shown in the Telegram menu.
    pub async fn register_commands(&self) {
        match self.bot.set_my_commands(Command::bot_commands()).await {
            Ok(_) => info!("Registered {} bot commands", Command::ALL.len()),
            Err(e) => warn!("Failed to register bot commands: {e}"),
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
